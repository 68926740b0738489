use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::config::{
    ExecutorConfig, DEFAULT_BUILD_TIMEOUT_SECS, DEFAULT_CPUS, DEFAULT_EXECUTION_READY_RETRIES,
    DEFAULT_FUNCTION_TIMEOUT_SECS, DEFAULT_INACTIVE_THRESHOLD_SECS,
    DEFAULT_LOG_STREAM_TIMEOUT_SECS, DEFAULT_MAINTENANCE_INTERVAL_SECS, DEFAULT_MEMORY_MIB,
    DEFAULT_NETWORK, DEFAULT_POOL_SIZE, DEFAULT_REGISTRY_CAPACITY, DEFAULT_RUNTIME_PORT,
    DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_SWAP_MIB, STORAGE_SUBDIR,
};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// monoexec - builds, runs and reclaims ephemeral function runtimes
#[derive(Debug, Parser)]
#[command(name = "monoexec", author, about, version, styles=styles::styles())]
pub struct MonoexecArgs {
    /// Address the control API listens on
    #[arg(long, env = "MONOEXEC_LISTEN_ADDR", default_value = "0.0.0.0:3456")]
    pub listen_addr: SocketAddr,

    /// Shared secret callers present as a bearer token
    #[arg(long, env = "MONOEXEC_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Number of container engine handles
    #[arg(long, env = "MONOEXEC_POOL_SIZE", default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    /// Maximum number of runtimes tracked at once
    #[arg(long, env = "MONOEXEC_REGISTRY_CAPACITY", default_value_t = DEFAULT_REGISTRY_CAPACITY)]
    pub registry_capacity: usize,

    /// CPUs per runtime
    #[arg(long, env = "MONOEXEC_CPUS", default_value_t = DEFAULT_CPUS)]
    pub cpus: f64,

    /// Memory per runtime in MiB
    #[arg(long, env = "MONOEXEC_MEMORY", default_value_t = DEFAULT_MEMORY_MIB)]
    pub memory: u64,

    /// Swap per runtime in MiB
    #[arg(long, env = "MONOEXEC_SWAP", default_value_t = DEFAULT_SWAP_MIB)]
    pub swap: u64,

    /// Build timeout in seconds
    #[arg(long, env = "MONOEXEC_BUILD_TIMEOUT", default_value_t = DEFAULT_BUILD_TIMEOUT_SECS)]
    pub build_timeout: u64,

    /// Default function timeout in seconds
    #[arg(long, env = "MONOEXEC_FUNCTION_TIMEOUT", default_value_t = DEFAULT_FUNCTION_TIMEOUT_SECS)]
    pub function_timeout: u64,

    /// Idle seconds after which a runtime is removed
    #[arg(long, env = "MONOEXEC_INACTIVE_THRESHOLD", default_value_t = DEFAULT_INACTIVE_THRESHOLD_SECS)]
    pub inactive_threshold: u64,

    /// Seconds between inactivity sweeps
    #[arg(long, env = "MONOEXEC_MAINTENANCE_INTERVAL", default_value_t = DEFAULT_MAINTENANCE_INTERVAL_SECS)]
    pub maintenance_interval: u64,

    /// Container network runtimes join
    #[arg(long, env = "MONOEXEC_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Comma separated base images runtimes may use; empty allows any
    #[arg(long, env = "MONOEXEC_IMAGES", value_delimiter = ',')]
    pub images: Vec<String>,

    /// Port the HTTP server inside every runtime listens on
    #[arg(long, env = "MONOEXEC_RUNTIME_PORT", default_value_t = DEFAULT_RUNTIME_PORT)]
    pub runtime_port: u16,

    /// Local directory for runtime work directories
    #[arg(long, env = "MONOEXEC_TEMP_DIR", default_value_os_t = std::env::temp_dir().join("monoexec"))]
    pub temp_dir: PathBuf,

    /// Root of the storage device holding source archives
    #[arg(long, env = "MONOEXEC_SOURCE_ROOT")]
    pub source_root: Option<PathBuf>,

    /// Root of the storage device receiving build artifacts
    #[arg(long, env = "MONOEXEC_DESTINATION_ROOT")]
    pub destination_root: Option<PathBuf>,

    /// Seconds a build log stream stays open
    #[arg(long, env = "MONOEXEC_LOG_STREAM_TIMEOUT", default_value_t = DEFAULT_LOG_STREAM_TIMEOUT_SECS)]
    pub log_stream_timeout: u64,

    /// Connection attempts against a runtime that is not listening yet
    #[arg(long, env = "MONOEXEC_EXECUTION_READY_RETRIES", default_value_t = DEFAULT_EXECUTION_READY_RETRIES)]
    pub execution_ready_retries: u32,

    /// Seconds in-flight requests get to finish after a shutdown signal
    #[arg(long, env = "MONOEXEC_SHUTDOWN_GRACE", default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS)]
    pub shutdown_grace: u64,

    /// Container engine CLI binary
    #[arg(long, env = "MONOEXEC_DOCKER", default_value = "docker")]
    pub docker: PathBuf,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl MonoexecArgs {
    /// Turns the arguments into an executor configuration.
    pub fn into_config(self) -> ExecutorConfig {
        let source_root = self
            .source_root
            .unwrap_or_else(|| self.temp_dir.join(STORAGE_SUBDIR));
        let destination_root = self
            .destination_root
            .unwrap_or_else(|| self.temp_dir.join(STORAGE_SUBDIR));

        ExecutorConfig::builder()
            .listen_addr(self.listen_addr)
            .secret(self.secret)
            .pool_size(self.pool_size)
            .registry_capacity(self.registry_capacity)
            .cpus(self.cpus)
            .memory_mib(self.memory)
            .swap_mib(self.swap)
            .build_timeout_secs(self.build_timeout)
            .function_timeout_secs(self.function_timeout)
            .inactive_threshold_secs(self.inactive_threshold)
            .maintenance_interval_secs(self.maintenance_interval)
            .network(self.network)
            .images(self.images)
            .runtime_port(self.runtime_port)
            .temp_dir(self.temp_dir)
            .source_root(source_root)
            .destination_root(destination_root)
            .log_stream_timeout_secs(self.log_stream_timeout)
            .execution_ready_retries(self.execution_ready_retries)
            .shutdown_grace_secs(self.shutdown_grace)
            .build()
    }
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
