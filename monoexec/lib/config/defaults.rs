//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Default port for the HTTP control API.
pub const DEFAULT_SERVER_PORT: u16 = 3456;

/// Default number of container engine handles in the orchestration pool.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default maximum number of runtimes tracked by a single process.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 4096;

/// Default number of CPUs a runtime container may use.
pub const DEFAULT_CPUS: f64 = 1.0;

/// Default memory limit of a runtime container in MiB.
pub const DEFAULT_MEMORY_MIB: u64 = 512;

/// Default swap limit of a runtime container in MiB.
pub const DEFAULT_SWAP_MIB: u64 = 512;

/// Default time a build may take, in seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 900;

/// Default time a function execution may take, in seconds.
pub const DEFAULT_FUNCTION_TIMEOUT_SECS: u64 = 900;

/// Default time after which an idle runtime is evicted, in seconds.
pub const DEFAULT_INACTIVE_THRESHOLD_SECS: u64 = 60 * 60;

/// Default interval between inactivity sweeps, in seconds.
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 60 * 60;

/// Default docker network runtimes are attached to.
pub const DEFAULT_NETWORK: &str = "executor_runtimes";

/// Default port the HTTP server inside every runtime listens on.
pub const DEFAULT_RUNTIME_PORT: u16 = 3000;

/// Default time a log stream stays open, in seconds.
pub const DEFAULT_LOG_STREAM_TIMEOUT_SECS: u64 = 600;

/// Default number of connection attempts made against a runtime that is not listening yet.
pub const DEFAULT_EXECUTION_READY_RETRIES: u32 = 5;

/// Default time in-flight requests get to finish after a shutdown signal, in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Fixed connect timeout used when calling into a runtime, in seconds.
pub const RUNTIME_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Number of registry polls made while a runtime is still pending.
pub const PENDING_WAIT_ATTEMPTS: u32 = 5;

/// Interval between registry polls while a runtime is pending, in milliseconds.
pub const PENDING_WAIT_INTERVAL_MS: u64 = 1000;

/// Backoff between connection attempts against a runtime that is not ready, in milliseconds.
pub const READY_RETRY_INTERVAL_MS: u64 = 500;

/// Maximum number of characters kept from a runtime's stdout or stderr.
pub const MAX_OUTPUT_CHARS: usize = 1_000_000;

/// Name of the sub directory of the temp root where runtime work directories live.
pub const RUNTIMES_SUBDIR: &str = "runtimes";

/// The directory, under the temp root, local storage devices default to.
pub const STORAGE_SUBDIR: &str = "storage";
