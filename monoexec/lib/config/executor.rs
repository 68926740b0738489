use std::{net::SocketAddr, path::PathBuf, time::Duration};

use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{ExecutorError, ExecutorResult};

use super::{
    DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_CPUS, DEFAULT_EXECUTION_READY_RETRIES,
    DEFAULT_FUNCTION_TIMEOUT_SECS, DEFAULT_INACTIVE_THRESHOLD_SECS,
    DEFAULT_LOG_STREAM_TIMEOUT_SECS, DEFAULT_MAINTENANCE_INTERVAL_SECS, DEFAULT_MEMORY_MIB,
    DEFAULT_NETWORK, DEFAULT_POOL_SIZE, DEFAULT_REGISTRY_CAPACITY, DEFAULT_RUNTIME_PORT,
    DEFAULT_SERVER_PORT, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_SWAP_MIB, STORAGE_SUBDIR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The configuration of a monoexec process.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters, Setters)]
#[getset(get = "pub with_prefix", set = "pub with_prefix")]
pub struct ExecutorConfig {
    /// The address the HTTP control API listens on.
    #[builder(default = SocketAddr::from(([0, 0, 0, 0], DEFAULT_SERVER_PORT)))]
    listen_addr: SocketAddr,

    /// The shared secret callers must present as a bearer token.
    #[builder(setter(into))]
    secret: String,

    /// The number of container engine handles in the pool.
    #[builder(default = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// The maximum number of runtimes tracked at once.
    #[builder(default = DEFAULT_REGISTRY_CAPACITY)]
    registry_capacity: usize,

    /// The number of CPUs a runtime container may use.
    #[builder(default = DEFAULT_CPUS)]
    cpus: f64,

    /// The memory limit of a runtime container in MiB.
    #[builder(default = DEFAULT_MEMORY_MIB)]
    memory_mib: u64,

    /// The swap limit of a runtime container in MiB.
    #[builder(default = DEFAULT_SWAP_MIB)]
    swap_mib: u64,

    /// The time a build may take, in seconds.
    #[builder(default = DEFAULT_BUILD_TIMEOUT_SECS)]
    build_timeout_secs: u64,

    /// The time an execution may take when the caller does not say, in seconds.
    #[builder(default = DEFAULT_FUNCTION_TIMEOUT_SECS)]
    function_timeout_secs: u64,

    /// The idle time after which a runtime is evicted, in seconds.
    #[builder(default = DEFAULT_INACTIVE_THRESHOLD_SECS)]
    inactive_threshold_secs: u64,

    /// The interval between inactivity sweeps, in seconds.
    #[builder(default = DEFAULT_MAINTENANCE_INTERVAL_SECS)]
    maintenance_interval_secs: u64,

    /// The container network every runtime joins.
    #[builder(default = DEFAULT_NETWORK.to_string(), setter(into))]
    network: String,

    /// The base images runtimes may be created from. Empty means any image.
    #[builder(default)]
    images: Vec<String>,

    /// The port the HTTP server inside every runtime listens on.
    #[builder(default = DEFAULT_RUNTIME_PORT)]
    runtime_port: u16,

    /// The local directory where per-runtime work directories are created.
    #[builder(default = std::env::temp_dir().join("monoexec"), setter(into))]
    temp_dir: PathBuf,

    /// The root of the storage device source archives are read from.
    #[builder(default = std::env::temp_dir().join("monoexec").join(STORAGE_SUBDIR), setter(into))]
    source_root: PathBuf,

    /// The root of the storage device build artifacts are written to.
    #[builder(default = std::env::temp_dir().join("monoexec").join(STORAGE_SUBDIR), setter(into))]
    destination_root: PathBuf,

    /// The time a log stream stays open, in seconds.
    #[builder(default = DEFAULT_LOG_STREAM_TIMEOUT_SECS)]
    log_stream_timeout_secs: u64,

    /// The number of connection attempts made against a runtime that is not listening yet.
    #[builder(default = DEFAULT_EXECUTION_READY_RETRIES)]
    execution_ready_retries: u32,

    /// The time in-flight requests get to finish once shutdown starts, in seconds.
    #[builder(default = DEFAULT_SHUTDOWN_GRACE_SECS)]
    shutdown_grace_secs: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExecutorConfig {
    /// Checks the configuration for values the process cannot run with.
    pub fn validate(&self) -> ExecutorResult<()> {
        if self.secret.trim().is_empty() {
            return Err(ExecutorError::InvalidArgument(
                "shared secret must not be empty".to_string(),
            ));
        }

        if self.pool_size == 0 {
            return Err(ExecutorError::InvalidArgument(
                "pool size must be at least 1".to_string(),
            ));
        }

        if self.registry_capacity == 0 {
            return Err(ExecutorError::InvalidArgument(
                "registry capacity must be at least 1".to_string(),
            ));
        }

        if self.cpus <= 0.0 || self.memory_mib == 0 {
            return Err(ExecutorError::InvalidArgument(
                "cpu and memory limits must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether `image` may be used as the base image of a runtime.
    pub fn is_image_allowed(&self, image: &str) -> bool {
        self.images.is_empty() || self.images.iter().any(|i| i == image)
    }

    /// The build timeout as a [`Duration`].
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// The default function timeout as a [`Duration`].
    pub fn function_timeout(&self) -> Duration {
        Duration::from_secs(self.function_timeout_secs)
    }

    /// The inactivity threshold as a [`Duration`].
    pub fn inactive_threshold(&self) -> Duration {
        Duration::from_secs(self.inactive_threshold_secs)
    }

    /// The maintenance interval as a [`Duration`].
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    /// The log stream timeout as a [`Duration`].
    pub fn log_stream_timeout(&self) -> Duration {
        Duration::from_secs(self.log_stream_timeout_secs)
    }

    /// The shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_defaults() {
        let config = ExecutorConfig::builder().secret("s3cret").build();

        assert_eq!(*config.get_pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(*config.get_registry_capacity(), DEFAULT_REGISTRY_CAPACITY);
        assert_eq!(config.get_network(), DEFAULT_NETWORK);
        assert_eq!(config.get_listen_addr().port(), DEFAULT_SERVER_PORT);
        assert_eq!(
            config.build_timeout(),
            Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_executor_config_validation() {
        let config = ExecutorConfig::builder().secret("  ").build();
        assert!(matches!(
            config.validate(),
            Err(ExecutorError::InvalidArgument(_))
        ));

        let config = ExecutorConfig::builder().secret("k").pool_size(0).build();
        assert!(config.validate().is_err());

        let config = ExecutorConfig::builder()
            .secret("k")
            .registry_capacity(0)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_executor_config_image_allow_list() {
        let open = ExecutorConfig::builder().secret("k").build();
        assert!(open.is_image_allowed("anything:latest"));

        let strict = ExecutorConfig::builder()
            .secret("k")
            .images(vec!["lang:1.0".to_string()])
            .build();
        assert!(strict.is_image_allowed("lang:1.0"));
        assert!(!strict.is_image_allowed("lang:2.0"));
    }
}
