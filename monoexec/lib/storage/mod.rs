//! Storage devices the executor moves source archives and build artifacts through.

mod local;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use local::*;

use std::path::Path;

use async_trait::async_trait;

use crate::ExecutorResult;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A device holding source archives and build artifacts, addressed by device-relative paths.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Copies the object at `path` on the device to the local file `local`.
    async fn download(&self, path: &str, local: &Path) -> ExecutorResult<()>;

    /// Copies the local file `local` to `path` on the device and returns the stored path.
    async fn upload(&self, local: &Path, path: &str) -> ExecutorResult<String>;

    /// Whether an object exists at `path` on the device.
    async fn exists(&self, path: &str) -> ExecutorResult<bool>;
}
