use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::fs;

use crate::{
    config::{ExecutorConfig, RUNTIME_CONNECT_TIMEOUT_SECS},
    engine::OrchestrationPool,
    runtime::{RuntimeRecord, RuntimeRegistry},
    storage::Storage,
    utils, ExecutorError, ExecutorResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Label marking a container as a runtime owned by an executor.
pub const LABEL_TYPE: &str = "monoexec.type";

/// The value of [`LABEL_TYPE`] on runtime containers.
pub const LABEL_TYPE_RUNTIME: &str = "runtime";

/// Label carrying the runtime identifier.
pub const LABEL_RUNTIME_ID: &str = "monoexec.runtime-id";

/// Label carrying the creation timestamp.
pub const LABEL_CREATED: &str = "monoexec.created";

/// Label carrying the runtime kind.
pub const LABEL_RUNTIME: &str = "monoexec.runtime";

/// Environment variable carrying the per-runtime secret into the container.
pub const RUNTIME_SECRET_ENV: &str = "RUNTIME_SECRET";

/// Environment variable carrying the function entrypoint into the container.
pub const RUNTIME_ENTRYPOINT_ENV: &str = "RUNTIME_ENTRYPOINT";

/// Header carrying the per-runtime secret on calls into the container.
pub const RUNTIME_SECRET_HEADER: &str = "x-runtime-secret";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The orchestrator of runtime containers.
///
/// Cheap to clone. Clones share the same registry, pool and storage devices, so one orchestrator
/// can be handed to every request handler and to the maintenance task.
#[derive(Clone)]
pub struct Orchestrator {
    /// The executor configuration.
    pub(super) config: Arc<ExecutorConfig>,

    /// The runtimes known to this process.
    pub(super) registry: Arc<RuntimeRegistry>,

    /// The container engine handles.
    pub(super) pool: Arc<OrchestrationPool>,

    /// Where source archives are read from.
    pub(super) source_storage: Arc<dyn Storage>,

    /// Where build artifacts are written to.
    pub(super) destination_storage: Arc<dyn Storage>,

    /// The client used to call into runtime containers.
    pub(super) http: reqwest::Client,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        config: ExecutorConfig,
        pool: OrchestrationPool,
        source_storage: Arc<dyn Storage>,
        destination_storage: Arc<dyn Storage>,
    ) -> ExecutorResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(RUNTIME_CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            registry: Arc::new(RuntimeRegistry::new(*config.get_registry_capacity())),
            config: Arc::new(config),
            pool: Arc::new(pool),
            source_storage,
            destination_storage,
            http,
        })
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The runtimes known to this process.
    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    /// The container engine handles.
    pub fn pool(&self) -> &OrchestrationPool {
        &self.pool
    }

    /// Returns every runtime known to this process, sorted by identifier.
    pub fn list_runtimes(&self) -> Vec<RuntimeRecord> {
        self.registry.list()
    }

    /// Returns the runtime `runtime_id`.
    pub fn get_runtime(&self, runtime_id: &str) -> ExecutorResult<RuntimeRecord> {
        self.registry
            .get(runtime_id)
            .ok_or_else(|| ExecutorError::NotFound(runtime_id.to_string()))
    }

    /// The local work directory of `runtime_id`.
    pub(super) fn work_dir(&self, runtime_id: &str) -> PathBuf {
        utils::runtime_dir(self.config.get_temp_dir(), runtime_id)
    }

    /// Removes the local work directory of `runtime_id`, if any.
    ///
    /// Identifiers that are not valid runtime ids, such as labels found on foreign containers,
    /// are skipped.
    pub(super) async fn remove_work_dir(&self, runtime_id: &str) {
        if let Err(e) = utils::validate_runtime_id(runtime_id) {
            tracing::warn!("not removing work directory: {e}");
            return;
        }

        let dir = self.work_dir(runtime_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!("removed work directory {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove work directory {}: {e}", dir.display()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
