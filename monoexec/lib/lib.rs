//! `monoexec` builds, invokes and reclaims short-lived function runtimes in containers.
//!
//! # Overview
//!
//! A caller submits a source archive and a list of build commands. monoexec starts an isolated
//! container for it, runs the build inside, stores the resulting artifact and keeps the
//! container around as a runtime that can be invoked over HTTP. Idle runtimes are reclaimed in
//! the background, and everything is torn down when the process stops.
//!
//! # Architecture
//!
//! - **Registry**: the in-process table of runtimes and their lifecycle status
//! - **Engine**: the container engine, driven through a fixed-size pool of handles
//! - **Orchestration**: builds, executions, log streaming and maintenance sweeps
//! - **Server**: the HTTP control API, guarded by a shared secret
//! - **Client**: the caller-side client of that API
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use monoexec::{
//!     config::ExecutorConfig,
//!     engine::{DockerEngine, Engine, OrchestrationPool},
//!     orchestration::{CreateRuntimeRequest, Orchestrator},
//!     storage::LocalStorage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ExecutorConfig::builder().secret("s3cret").build();
//!     let pool = OrchestrationPool::from_fn(*config.get_pool_size(), || {
//!         Box::new(DockerEngine::default()) as Box<dyn Engine>
//!     });
//!     let storage = Arc::new(LocalStorage::new("/var/lib/monoexec/storage"));
//!     let orchestrator = Orchestrator::new(config, pool, storage.clone(), storage)?;
//!
//!     let request = CreateRuntimeRequest::builder()
//!         .runtime_id("hello")
//!         .source("functions/hello/code.tar.gz")
//!         .base_image("node:20-alpine")
//!         .commands(vec!["npm install".to_string()])
//!         .build();
//!
//!     let result = orchestrator.create_runtime(request).await?;
//!     println!("built in {:.2}s", result.duration);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument parsing
//! - [`client`] - Client of the control API
//! - [`config`] - Configuration types and defaults
//! - [`engine`] - Container engine abstraction and handle pool
//! - [`orchestration`] - Runtime lifecycle management
//! - [`runtime`] - Runtime records and the registry
//! - [`server`] - HTTP control API
//! - [`storage`] - Storage devices for sources and artifacts
//! - [`utils`] - Common utilities and helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod orchestration;
pub mod runtime;
pub mod server;
pub mod storage;
pub mod utils;

pub use error::*;
