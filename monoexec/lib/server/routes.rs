//! Route definitions for the HTTP server.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::ExecutorError;

use super::{data::ErrorResponse, handlers, state::ServerState};

//-------------------------------------------------------------------------------------------------
// Functions
//-------------------------------------------------------------------------------------------------

/// Creates a new router with all API endpoints configured.
///
/// Every route except `/v1/health` requires the shared secret as a bearer token.
pub fn create_router(state: ServerState) -> Router {
    let protected = Router::new()
        .route(
            "/v1/runtimes",
            post(handlers::create_runtime).get(handlers::list_runtimes),
        )
        .route(
            "/v1/runtimes/{id}",
            get(handlers::get_runtime).delete(handlers::delete_runtime),
        )
        .route("/v1/runtimes/{id}/logs", get(handlers::runtime_logs))
        .route("/v1/execution", post(handlers::create_execution))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/v1/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
}

/// Rejects requests that do not carry the shared secret as a bearer token.
async fn auth_middleware(
    State(state): State<ServerState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "));

    let rejection = match token {
        Some(token) if token == state.secret() => None,
        Some(_) => Some("invalid shared secret"),
        None => Some("missing or invalid Bearer token"),
    };

    match rejection {
        None => next.run(req).await,
        Some(reason) => {
            ErrorResponse::from(ExecutorError::AuthFailure(reason.into())).into_response()
        }
    }
}
