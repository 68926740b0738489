use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{ExecutorError, ExecutorResult};

use super::Storage;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`Storage`] device backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// The directory every device path is resolved against.
    root: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LocalStorage {
    /// Creates a device rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory every device path is resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a device path to a local path, refusing paths that escape the root.
    fn resolve(&self, path: &str) -> ExecutorResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if relative.as_os_str().is_empty() || escapes {
            return Err(ExecutorError::InvalidArgument(format!(
                "invalid storage path: {path}"
            )));
        }

        Ok(self.root.join(relative))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Storage for LocalStorage {
    async fn download(&self, path: &str, local: &Path) -> ExecutorResult<()> {
        let source = self.resolve(path)?;
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(&source, local).await.map_err(|e| {
            ExecutorError::UpstreamFailure(format!(
                "failed to copy {} from storage: {}",
                source.display(),
                e
            ))
        })?;

        Ok(())
    }

    async fn upload(&self, local: &Path, path: &str) -> ExecutorResult<String> {
        let destination = self.resolve(path)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(local, &destination).await.map_err(|e| {
            ExecutorError::UpstreamFailure(format!(
                "failed to copy {} to storage: {}",
                local.display(),
                e
            ))
        })?;

        Ok(path.to_string())
    }

    async fn exists(&self, path: &str) -> ExecutorResult<bool> {
        Ok(fs::try_exists(self.resolve(path)?).await?)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
