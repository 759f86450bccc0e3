use crate::db::Store;
use crate::scheduler::{Job, JobContext, JobError};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::info;

/// Deletes old read notifications and expired cache rows.
pub struct StaleCleanupJob {
    store: Store,
    interval: Duration,
    read_retention: chrono::Duration,
}

impl StaleCleanupJob {
    #[must_use]
    pub fn new(store: Store, interval: Duration, read_retention_days: u32) -> Self {
        Self {
            store,
            interval,
            read_retention: chrono::Duration::days(i64::from(read_retention_days)),
        }
    }
}

#[async_trait]
impl Job for StaleCleanupJob {
    fn name(&self) -> &'static str {
        "stale_cleanup"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let now = Utc::now();

        let notifications = self
            .store
            .delete_read_notifications_before(now - self.read_retention)
            .await?;

        ctx.checkpoint()?;
        let cache_entries = self.store.purge_expired_cache(now).await?;

        if notifications > 0 || cache_entries > 0 {
            info!(notifications, cache_entries, "Removed stale data");
        }
        Ok(())
    }
}
