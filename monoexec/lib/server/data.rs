use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::ExecutorError;

//--------------------------------------------------------------------------------------------------
// Types: Requests
//--------------------------------------------------------------------------------------------------

/// Query parameters of the build log endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Seconds to keep the stream open. Defaults to the configured log stream timeout.
    pub timeout: Option<u64>,
}

//--------------------------------------------------------------------------------------------------
// Types: Responses
//--------------------------------------------------------------------------------------------------

/// Response type for operations that return no resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// What happened.
    pub message: String,
}

/// Response of the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `pass` while the server answers.
    pub status: String,

    /// The number of runtimes tracked.
    pub runtimes: usize,

    /// The maximum number of runtimes tracked.
    pub capacity: usize,

    /// The number of container engine handles.
    pub pool_size: usize,
}

//--------------------------------------------------------------------------------------------------
// Types: Error Response
//--------------------------------------------------------------------------------------------------

/// Standard error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub code: u16,

    /// Error message
    pub message: String,

    /// Error type for categorizing errors
    pub error_type: ErrorType,

    /// Optional additional details about the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Types of errors that can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Invalid request parameters or body
    ValidationError,

    /// Missing or wrong shared secret
    AuthenticationError,

    /// Resource not found
    NotFound,

    /// The runtime already exists
    Conflict,

    /// The runtime is still being created
    Transient,

    /// The runtime did not become ready or did not answer in time
    Timeout,

    /// A build or the container engine failed
    RuntimeError,

    /// Internal server errors
    InternalError,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StatusResponse {
    /// Creates a new status response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: u16, message: String, error_type: ErrorType) -> Self {
        Self {
            code,
            message,
            error_type,
            details: None,
        }
    }

    /// Add details to the error response, ignoring details for 500-level errors
    pub fn with_details(mut self, details: String) -> Self {
        if self.code < 500 {
            self.details = Some(details);
        }
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<ExecutorError> for ErrorResponse {
    fn from(error: ExecutorError) -> Self {
        let code = error.status_code();
        match &error {
            ExecutorError::NotFound(id) => {
                ErrorResponse::new(code, "Runtime not found".into(), ErrorType::NotFound)
                    .with_details(id.clone())
            }
            ExecutorError::Conflict(id) => {
                ErrorResponse::new(code, "Runtime already exists".into(), ErrorType::Conflict)
                    .with_details(id.clone())
            }
            ExecutorError::InvalidArgument(reason) => {
                ErrorResponse::new(code, "Invalid request".into(), ErrorType::ValidationError)
                    .with_details(reason.clone())
            }
            ExecutorError::AuthFailure(_) => ErrorResponse::new(
                code,
                error.to_string(),
                ErrorType::AuthenticationError,
            ),
            ExecutorError::Transient(_) => {
                ErrorResponse::new(code, error.to_string(), ErrorType::Transient)
            }
            ExecutorError::LaunchTimeout(_)
            | ExecutorError::NotReady(_)
            | ExecutorError::Timeout(_) => {
                ErrorResponse::new(code, error.to_string(), ErrorType::Timeout)
            }
            ExecutorError::BuildFailed(_) | ExecutorError::UpstreamFailure(_) => {
                ErrorResponse::new(code, error.to_string(), ErrorType::RuntimeError)
            }
            _ => ErrorResponse::new(code, error.to_string(), ErrorType::InternalError),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
