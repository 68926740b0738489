use std::{collections::BTreeMap, path::Path, time::Duration};

use async_trait::async_trait;
use getset::Getters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::ExecutorResult;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Operations the executor needs from a container engine.
///
/// Every call is bounded by a timeout chosen by the implementation (or passed in, for
/// `execute`); none may block indefinitely.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Starts a detached container and returns the identifier the engine assigned to it.
    async fn run(&self, options: &RunOptions) -> ExecutorResult<String>;

    /// Runs `command` inside the running container `name`.
    ///
    /// When `log_path` is given, every line of output is appended to that file as it is produced.
    /// Exceeding `timeout` fails with [`ExecutorError::Timeout`](crate::ExecutorError::Timeout).
    async fn execute(
        &self,
        name: &str,
        command: &[String],
        timeout: Duration,
        log_path: Option<&Path>,
    ) -> ExecutorResult<ExecOutput>;

    /// Removes the container `name` (a name or an engine identifier). Returns whether it was removed.
    async fn remove(&self, name: &str, force: bool) -> ExecutorResult<bool>;

    /// Lists all containers carrying every one of the given labels.
    async fn list(&self, labels: &[(String, String)]) -> ExecutorResult<Vec<ContainerSummary>>;

    /// Attaches the container `name` to `network`. Returns whether it succeeded.
    async fn network_connect(&self, name: &str, network: &str) -> ExecutorResult<bool>;

    /// Pulls `image` into the engine's local cache. Returns whether it succeeded.
    async fn pull(&self, image: &str) -> ExecutorResult<bool>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The parameters of a container to start.
#[derive(Debug, Clone, Default, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct RunOptions {
    /// The image to start the container from.
    #[builder(setter(into))]
    image: String,

    /// The container name.
    #[builder(setter(into))]
    name: String,

    /// The hostname inside the container.
    #[builder(setter(into))]
    hostname: String,

    /// The number of CPUs the container may use.
    #[builder(default)]
    cpus: f64,

    /// The memory limit in MiB.
    #[builder(default)]
    memory_mib: u64,

    /// The swap limit in MiB, on top of `memory_mib`.
    #[builder(default)]
    swap_mib: u64,

    /// The environment of the container.
    #[builder(default)]
    env: BTreeMap<String, String>,

    /// The command to run. Empty means the image default.
    #[builder(default)]
    command: Vec<String>,

    /// The labels attached to the container.
    #[builder(default)]
    labels: BTreeMap<String, String>,

    /// The working directory inside the container.
    #[builder(default, setter(strip_option, into))]
    workdir: Option<String>,

    /// Bind mounts in `host:container[:mode]` form.
    #[builder(default)]
    volumes: Vec<String>,
}

/// The outcome of a command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Whether the command exited with status zero.
    pub success: bool,

    /// What the command wrote to stdout.
    pub stdout: String,

    /// What the command wrote to stderr.
    pub stderr: String,
}

/// A container as reported by [`Engine::list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// The engine identifier.
    pub id: String,

    /// The container name.
    pub name: String,

    /// The container labels.
    pub labels: BTreeMap<String, String>,

    /// The engine's human readable status.
    pub status: String,
}
