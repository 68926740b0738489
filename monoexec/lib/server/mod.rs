//! The HTTP control API of an executor.
//!
//! Callers create runtimes, follow their build logs, invoke them and delete them through a small
//! JSON API guarded by a shared secret:
//! - `POST /v1/runtimes`, `GET /v1/runtimes`
//! - `GET /v1/runtimes/{id}`, `DELETE /v1/runtimes/{id}`, `GET /v1/runtimes/{id}/logs`
//! - `POST /v1/execution`
//! - `GET /v1/health` (no secret required)

mod api;
mod data;
mod handlers;
mod routes;
mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use api::*;
pub use data::*;
pub use routes::*;
pub use state::*;
