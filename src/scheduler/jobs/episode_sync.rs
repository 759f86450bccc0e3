//! Periodic reconciliation of every followed title.

use crate::db::Store;
use crate::scheduler::{Job, JobContext, JobError};
use crate::services::Syncer;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct EpisodeSyncJob {
    store: Store,
    syncer: Arc<Syncer>,
    interval: Duration,
    title_delay: Duration,
}

impl EpisodeSyncJob {
    #[must_use]
    pub const fn new(
        store: Store,
        syncer: Arc<Syncer>,
        interval: Duration,
        title_delay: Duration,
    ) -> Self {
        Self {
            store,
            syncer,
            interval,
            title_delay,
        }
    }
}

#[async_trait]
impl Job for EpisodeSyncJob {
    fn name(&self) -> &'static str {
        "episode_sync"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let title_ids = self.store.tracked_title_ids().await?;
        let total = title_ids.len();
        info!(titles = total, "Syncing tracked titles");

        let mut synced = 0usize;
        let mut failed = 0usize;

        for (index, title_id) in title_ids.into_iter().enumerate() {
            ctx.checkpoint()?;

            match self.syncer.reconcile(title_id).await {
                Ok(_) => synced += 1,
                Err(e) => {
                    failed += 1;
                    error!(%title_id, error = %e, "Title sync failed");
                }
            }

            if index + 1 < total {
                ctx.sleep(self.title_delay).await?;
            }
        }

        info!(synced, failed, "Episode sync pass complete");
        Ok(())
    }
}
