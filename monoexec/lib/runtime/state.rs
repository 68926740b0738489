use std::{fmt, str::FromStr};

use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};

use crate::{utils, ExecutorError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The live state of a runtime known to this process.
#[derive(Debug, Clone, PartialEq, Getters, Setters, Serialize, Deserialize)]
#[getset(get = "pub with_prefix", set = "pub with_prefix")]
pub struct RuntimeRecord {
    /// The identifier the container engine assigned. Empty until the container exists.
    id: String,

    /// The runtime identifier. Also used as the container name.
    name: String,

    /// The hostname the runtime is reachable at on the runtime network.
    hostname: String,

    /// The base image the runtime was created from.
    image: String,

    /// The lifecycle status of the runtime.
    status: RuntimeStatus,

    /// When the runtime was created, as a Unix timestamp.
    created: i64,

    /// When the runtime was last used, as a Unix timestamp. Drives inactivity eviction.
    updated: i64,

    /// Token authorizing calls into the running container.
    #[serde(skip_serializing, default)]
    secret: String,
}

/// The lifecycle status of a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RuntimeStatus {
    /// The runtime is being created or built.
    Pending,

    /// The runtime is up. `duration` is how long creation took, in seconds.
    Up {
        /// Seconds spent creating the runtime.
        duration: f64,
    },

    /// Creating the runtime failed.
    Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeRecord {
    /// Creates a new `pending` record stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        image: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let now = utils::now_timestamp();
        Self {
            id: String::new(),
            name: name.into(),
            hostname: hostname.into(),
            image: image.into(),
            status: RuntimeStatus::Pending,
            created: now,
            updated: now,
            secret: secret.into(),
        }
    }

    /// Whether the runtime is still being created.
    pub fn is_pending(&self) -> bool {
        self.status == RuntimeStatus::Pending
    }

    /// Whether the runtime is up.
    pub fn is_up(&self) -> bool {
        matches!(self.status, RuntimeStatus::Up { .. })
    }

    /// Refreshes the activity clock.
    pub fn touch(&mut self) {
        self.updated = utils::now_timestamp();
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::Pending => write!(f, "pending"),
            RuntimeStatus::Up { duration } => write!(f, "Up {:.2}s", duration),
            RuntimeStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for RuntimeStatus {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RuntimeStatus::Pending),
            "error" => Ok(RuntimeStatus::Error),
            _ => s
                .strip_prefix("Up ")
                .and_then(|rest| rest.strip_suffix('s'))
                .and_then(|secs| secs.parse::<f64>().ok())
                .map(|duration| RuntimeStatus::Up { duration })
                .ok_or_else(|| {
                    ExecutorError::InvalidArgument(format!("invalid runtime status: {s}"))
                }),
        }
    }
}

impl From<RuntimeStatus> for String {
    fn from(status: RuntimeStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for RuntimeStatus {
    type Error = ExecutorError;

    fn try_from(value: String) -> Result<Self, ExecutorError> {
        value.parse()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
