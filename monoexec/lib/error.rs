use std::{
    error::Error,
    fmt::{self, Display},
};
use thiserror::Error;

use crate::orchestration::BuildResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a monoexec-related operation.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// An error that occurred while building, invoking or managing a runtime.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ExecutorError {
    /// A runtime with the same identifier already exists.
    #[error("runtime already exists: {0}")]
    Conflict(String),

    /// The runtime is not known to this process.
    #[error("runtime not found: {0}")]
    NotFound(String),

    /// A runtime with the same identifier is still being created. Retry shortly.
    #[error("runtime is still pending, retry shortly: {0}")]
    Transient(String),

    /// A build or execution exceeded its time bound.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The runtime stayed `pending` for longer than the readiness window.
    #[error("runtime failed to launch in time: {0}")]
    LaunchTimeout(String),

    /// The runtime container refused the connection; its server is not listening yet.
    #[error("runtime is not ready yet: {0}")]
    NotReady(String),

    /// The container engine or a storage device failed.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// A shared secret or per-runtime secret is missing or wrong.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// A build ran but did not succeed. The result carries the captured output.
    #[error("build failed: {}", .0.stderr)]
    BuildFailed(Box<BuildResult>),

    /// The registry is full. This is a configuration problem, not a transient one.
    #[error("runtime registry capacity of {0} exceeded")]
    CapacityExceeded(usize),

    /// An invalid argument was provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote executor answered with an error status.
    #[error("executor responded with {status}: {message}")]
    Remote {
        /// The HTTP status code returned by the executor.
        status: u16,

        /// The message returned by the executor.
        message: String,
    },

    /// The remote executor did not answer before the local request timeout.
    #[error("synchronous request timed out: {0}")]
    SyncTimeout(String),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error that occurred during an HTTP request.
    #[error("http request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// An error that occurred during an HTTP middleware operation.
    #[error("http middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExecutorError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> ExecutorError {
        ExecutorError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// The HTTP status code this error is reported with by the control API.
    pub fn status_code(&self) -> u16 {
        match self {
            ExecutorError::Conflict(_) => 409,
            ExecutorError::NotFound(_) => 404,
            ExecutorError::LaunchTimeout(_) | ExecutorError::NotReady(_) => 406,
            ExecutorError::AuthFailure(_) => 401,
            ExecutorError::InvalidArgument(_) => 400,
            ExecutorError::Remote { status, .. } => *status,
            _ => 500,
        }
    }

    /// Whether the caller should retry the same request shortly.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutorError::Transient(_) | ExecutorError::NotReady(_))
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `ExecutorResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> ExecutorResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
