use std::{collections::BTreeMap, time::Duration};

use futures::future::join_all;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{engine::ContainerSummary, utils};

use super::{Orchestrator, LABEL_RUNTIME_ID, LABEL_TYPE, LABEL_TYPE_RUNTIME};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Orchestrator {
    /// Pulls every allowed image so the first build does not pay for it. Failures are logged.
    pub async fn warmup(&self) {
        let images = self.config.get_images();
        if images.is_empty() {
            return;
        }

        tracing::info!("pulling {} images", images.len());
        let pulls = images.iter().map(|image| async move {
            let pulled = match self.pool.acquire().await {
                Ok(engine) => engine.pull(image).await,
                Err(e) => Err(e),
            };

            match pulled {
                Ok(true) => tracing::info!("pulled image {image}"),
                Ok(false) => tracing::warn!("failed to pull image {image}"),
                Err(e) => tracing::warn!("failed to pull image {image}: {e}"),
            }
        });

        join_all(pulls).await;
    }

    /// Removes every runtime container the registry does not track, such as those a previous
    /// process left behind. Returns the number of containers removed.
    pub async fn sweep_orphans(&self) -> usize {
        let containers = self.list_runtime_containers().await;
        let removals = containers
            .iter()
            .map(|c| (c, c.labels.get(LABEL_RUNTIME_ID).unwrap_or(&c.name)))
            .filter(|(_, runtime_id)| !self.registry.contains(runtime_id))
            .map(|(c, runtime_id)| async move {
                tracing::info!("removing orphaned runtime container {}", c.name);
                let removed = self.remove_container(runtime_id, Some(&c.id)).await;
                self.remove_work_dir(runtime_id).await;
                removed
            });

        let removed = join_all(removals).await.into_iter().filter(|r| *r).count();
        tracing::info!("removed {removed} orphaned runtime containers");
        removed
    }

    /// Removes every runtime idle for longer than the inactivity threshold. Returns the number
    /// of runtimes removed.
    pub async fn prune_inactive(&self) -> usize {
        let threshold = self.config.inactive_threshold().as_secs() as i64;
        let cutoff = utils::now_timestamp() - threshold;

        let stale: Vec<_> = self
            .registry
            .list()
            .into_iter()
            .filter(|record| *record.get_updated() < cutoff)
            .collect();

        if stale.is_empty() {
            tracing::debug!("no inactive runtimes");
            return 0;
        }

        let removals = stale.iter().map(|record| async move {
            let runtime_id = record.get_name();
            tracing::info!("removing inactive runtime {runtime_id}");

            let container_id = Some(record.get_id().as_str()).filter(|id| !id.is_empty());
            self.remove_container(runtime_id, container_id).await;
            self.registry.delete(runtime_id);
            self.remove_work_dir(runtime_id).await;
        });

        join_all(removals).await;
        stale.len()
    }

    /// Removes every runtime container the engine reports and every runtime this process knows
    /// about. Used on shutdown. Returns the number of runtimes removed.
    pub async fn drain(&self) -> usize {
        let records = self.registry.clear();
        let containers = self.list_runtime_containers().await;

        let mut targets: BTreeMap<String, Option<String>> = containers
            .into_iter()
            .map(|c| {
                let runtime_id = c.labels.get(LABEL_RUNTIME_ID).cloned().unwrap_or(c.name);
                (runtime_id, Some(c.id))
            })
            .collect();

        for record in records {
            let container_id = Some(record.get_id().clone()).filter(|id| !id.is_empty());
            targets.entry(record.get_name().clone()).or_insert(container_id);
        }

        tracing::info!("draining {} runtimes", targets.len());
        let removals = targets.iter().map(|(runtime_id, container_id)| async move {
            self.remove_container(runtime_id, container_id.as_deref())
                .await;
            self.remove_work_dir(runtime_id).await;
        });

        join_all(removals).await;
        targets.len()
    }

    /// Prunes inactive runtimes every maintenance interval until `shutdown` is cancelled.
    ///
    /// The first sweep runs one full interval after the call.
    pub async fn run_maintenance(&self, shutdown: CancellationToken) {
        let period = self.config.maintenance_interval().max(Duration::from_millis(10));
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("maintenance stopped");
                    return;
                }
                _ = interval.tick() => {
                    let pruned = self.prune_inactive().await;
                    tracing::debug!("maintenance pruned {pruned} runtimes");
                }
            }
        }
    }

    /// Lists every container carrying the runtime label. Failures are logged and yield nothing.
    async fn list_runtime_containers(&self) -> Vec<ContainerSummary> {
        let labels = [(LABEL_TYPE.to_string(), LABEL_TYPE_RUNTIME.to_string())];
        let listed = match self.pool.acquire().await {
            Ok(engine) => engine.list(&labels).await,
            Err(e) => Err(e),
        };

        listed.unwrap_or_else(|e| {
            tracing::warn!("failed to list runtime containers: {e}");
            vec![]
        })
    }
}
