use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

//--------------------------------------------------------------------------------------------------
// Types: Requests
//--------------------------------------------------------------------------------------------------

/// A request to create (and optionally build) a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuntimeRequest {
    /// The runtime identifier. Also the container name.
    #[builder(setter(into))]
    pub runtime_id: String,

    /// Path of the source archive on the source storage device.
    #[builder(setter(into))]
    pub source: String,

    /// Directory on the destination storage device the build artifact is copied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub destination: Option<String>,

    /// Environment variables passed to the container.
    #[serde(default)]
    #[builder(default)]
    pub vars: BTreeMap<String, String>,

    /// Build commands run inside the container, in order.
    #[serde(default)]
    #[builder(default)]
    pub commands: Vec<String>,

    /// The runtime kind, e.g. `node-18.0`. Recorded as a container label.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub runtime: String,

    /// The image the container is created from.
    #[builder(setter(into))]
    pub base_image: String,

    /// The entrypoint file of the function.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub entrypoint: String,

    /// Tear the container down once the build finishes.
    #[serde(default)]
    #[builder(default)]
    pub remove: bool,

    /// The working directory inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub workdir: Option<String>,
}

/// A request to invoke a function inside a ready runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// The runtime to invoke.
    #[builder(setter(into))]
    pub runtime_id: String,

    /// Environment variables passed to the function.
    #[serde(default)]
    #[builder(default)]
    pub vars: BTreeMap<String, String>,

    /// The payload handed to the function.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub data: String,

    /// Seconds the function may run. Defaults to the configured function timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub timeout: Option<u64>,
}

//--------------------------------------------------------------------------------------------------
// Types: Results
//--------------------------------------------------------------------------------------------------

/// The outcome of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// Whether the build succeeded.
    pub status: BuildStatus,

    /// What the build wrote to stdout.
    pub response: String,

    /// What the build wrote to stderr, or why it failed.
    pub stderr: String,

    /// When the build started, as a Unix timestamp in seconds.
    pub start_time: f64,

    /// When the build ended, as a Unix timestamp in seconds.
    pub end_time: f64,

    /// Seconds the build took.
    pub duration: f64,

    /// Where the build artifact was stored on the destination device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// Whether a build succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// The runtime was created and every build step succeeded.
    Ready,

    /// A build step failed.
    Failed,
}

/// The outcome of a function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Whether the function succeeded.
    pub status: ExecutionStatus,

    /// The HTTP status the runtime answered with.
    pub status_code: u16,

    /// The function's response body.
    pub response: String,

    /// The function's error output.
    pub stderr: String,

    /// Seconds the invocation took.
    pub time: f64,
}

/// Whether a function invocation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The runtime answered with a non-error status.
    Completed,

    /// The runtime answered with a server error status.
    Failed,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BuildResult {
    /// Whether the build succeeded.
    pub fn is_ready(&self) -> bool {
        self.status == BuildStatus::Ready
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
