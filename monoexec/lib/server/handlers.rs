//! HTTP request handlers for the control API.
//!
//! Each handler forwards to the [`Orchestrator`](crate::orchestration::Orchestrator) and renders
//! failures as an [`ErrorResponse`] carrying the status code of the error.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    orchestration::{BuildResult, CreateRuntimeRequest, ExecutionRequest, ExecutionResult},
    runtime::RuntimeRecord,
};

use super::{
    data::{ErrorResponse, ErrorType, HealthResponse, LogsQuery, StatusResponse},
    state::ServerState,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Type alias for the standard API response
type ApiResponse<T> = Result<T, ErrorResponse>;

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for `POST /v1/runtimes`
pub async fn create_runtime(
    State(state): State<ServerState>,
    request: Result<Json<CreateRuntimeRequest>, JsonRejection>,
) -> ApiResponse<(StatusCode, Json<BuildResult>)> {
    let Json(request) = request.map_err(invalid_body)?;
    tracing::info!("received create request for runtime {}", request.runtime_id);

    let result = state.orchestrator().create_runtime(request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Handler for `GET /v1/runtimes`
pub async fn list_runtimes(State(state): State<ServerState>) -> Json<Vec<RuntimeRecord>> {
    Json(state.orchestrator().list_runtimes())
}

/// Handler for `GET /v1/runtimes/:id`
pub async fn get_runtime(
    State(state): State<ServerState>,
    Path(runtime_id): Path<String>,
) -> ApiResponse<Json<RuntimeRecord>> {
    Ok(Json(state.orchestrator().get_runtime(&runtime_id)?))
}

/// Handler for `DELETE /v1/runtimes/:id`
pub async fn delete_runtime(
    State(state): State<ServerState>,
    Path(runtime_id): Path<String>,
) -> ApiResponse<Json<StatusResponse>> {
    state.orchestrator().delete_runtime(&runtime_id).await?;
    Ok(Json(StatusResponse::new(format!(
        "Runtime {runtime_id} removed"
    ))))
}

/// Handler for `GET /v1/runtimes/:id/logs`
///
/// Streams the build log as a chunked plain text body.
pub async fn runtime_logs(
    State(state): State<ServerState>,
    Path(runtime_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResponse<Response> {
    let stream = state
        .orchestrator()
        .stream_logs(&runtime_id, query.timeout.map(Duration::from_secs))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Handler for `POST /v1/execution`
pub async fn create_execution(
    State(state): State<ServerState>,
    request: Result<Json<ExecutionRequest>, JsonRejection>,
) -> ApiResponse<Json<ExecutionResult>> {
    let Json(request) = request.map_err(invalid_body)?;
    let result = state.orchestrator().create_execution(request).await?;
    Ok(Json(result))
}

/// Handler for `GET /v1/health`
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let orchestrator = state.orchestrator();
    Json(HealthResponse {
        status: "pass".to_string(),
        runtimes: orchestrator.registry().len(),
        capacity: orchestrator.registry().capacity(),
        pool_size: orchestrator.pool().size(),
    })
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn invalid_body(rejection: JsonRejection) -> ErrorResponse {
    ErrorResponse::new(
        400,
        "Invalid request body".to_string(),
        ErrorType::ValidationError,
    )
    .with_details(rejection.body_text())
}
