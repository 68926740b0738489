use std::path::{Path, PathBuf};

use crate::{config::RUNTIMES_SUBDIR, ExecutorError, ExecutorResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The sub directory of a runtime work directory holding the downloaded source.
pub const SOURCE_SUBDIR: &str = "src";

/// The sub directory of a runtime work directory holding build output.
pub const BUILDS_SUBDIR: &str = "builds";

/// The sub directory of a runtime work directory holding build logs.
pub const LOGS_SUBDIR: &str = "logs";

/// The file name of the source archive inside [`SOURCE_SUBDIR`].
pub const SOURCE_ARCHIVE_FILENAME: &str = "code.tar.gz";

/// The file name of the build artifact inside [`BUILDS_SUBDIR`].
pub const BUILD_ARTIFACT_FILENAME: &str = "code.tar.gz";

/// The file name of the build log inside [`LOGS_SUBDIR`].
pub const BUILD_LOG_FILENAME: &str = "build.log";

/// Where the source directory is mounted inside the container.
pub const CONTAINER_SOURCE_PATH: &str = "/tmp";

/// Where the build output directory is mounted inside the container.
pub const CONTAINER_BUILDS_PATH: &str = "/usr/builds";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Checks that `runtime_id` is a valid container name: an ASCII alphanumeric followed by
/// alphanumerics, `_`, `.` or `-`, and never containing `..`.
///
/// Runtime identifiers become directory names under the temp directory, so anything that could
/// step outside it is rejected.
pub fn validate_runtime_id(runtime_id: &str) -> ExecutorResult<()> {
    let mut chars = runtime_id.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        && !runtime_id.contains("..");

    if valid {
        Ok(())
    } else {
        Err(ExecutorError::InvalidArgument(format!(
            "invalid runtime id: {runtime_id:?}"
        )))
    }
}

/// The local work directory of a runtime.
pub fn runtime_dir(temp_dir: &Path, runtime_id: &str) -> PathBuf {
    temp_dir.join(RUNTIMES_SUBDIR).join(runtime_id)
}

/// The local path of a runtime's build log.
pub fn build_log_path(temp_dir: &Path, runtime_id: &str) -> PathBuf {
    runtime_dir(temp_dir, runtime_id)
        .join(LOGS_SUBDIR)
        .join(BUILD_LOG_FILENAME)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
