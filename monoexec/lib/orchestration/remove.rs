use crate::{ExecutorError, ExecutorResult};

use super::Orchestrator;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Removes the runtime `runtime_id`: its container, its registry record and its local work
    /// directory.
    ///
    /// A container that is already gone is not an error. Deleting a runtime that is still being
    /// built tears its container down; the build then fails and finds no record to update.
    pub async fn delete_runtime(&self, runtime_id: &str) -> ExecutorResult<()> {
        let record = self
            .registry
            .get(runtime_id)
            .ok_or_else(|| ExecutorError::NotFound(runtime_id.to_string()))?;

        let container_id = Some(record.get_id().as_str()).filter(|id| !id.is_empty());
        self.remove_container(runtime_id, container_id).await;
        self.registry.delete(runtime_id);
        self.remove_work_dir(runtime_id).await;

        tracing::info!("removed runtime {runtime_id}");
        Ok(())
    }

    /// Force-removes the container of `runtime_id`, by engine identifier when known and by name
    /// otherwise. Returns whether a container was removed. Never fails; problems are logged.
    pub(super) async fn remove_container(
        &self,
        runtime_id: &str,
        container_id: Option<&str>,
    ) -> bool {
        let target = container_id.unwrap_or(runtime_id);
        let removed = match self.pool.acquire().await {
            Ok(engine) => engine.remove(target, true).await,
            Err(e) => Err(e),
        };

        match removed {
            Ok(true) => true,
            Ok(false) if container_id.is_some() => {
                // Retry by name.
                match self.pool.acquire().await {
                    Ok(engine) => engine.remove(runtime_id, true).await.unwrap_or(false),
                    Err(_) => false,
                }
            }
            Ok(false) => {
                tracing::debug!("no container to remove for runtime {runtime_id}");
                false
            }
            Err(e) => {
                tracing::warn!("failed to remove container of runtime {runtime_id}: {e}");
                false
            }
        }
    }
}
