//! Delivers due notifications to every active device of their user.

use crate::clients::PushProvider;
use crate::db::Store;
use crate::models::notification::Notification;
use crate::scheduler::{Job, JobContext, JobError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Failed,
}

impl Delivery {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

pub struct NotificationDispatchJob {
    store: Store,
    push: Arc<dyn PushProvider>,
    interval: Duration,
    batch_size: u64,
}

impl NotificationDispatchJob {
    #[must_use]
    pub fn new(
        store: Store,
        push: Arc<dyn PushProvider>,
        interval: Duration,
        batch_size: u64,
    ) -> Self {
        Self {
            store,
            push,
            interval,
            batch_size,
        }
    }

    async fn deliver(&self, notification: &Notification) -> Delivery {
        let devices = match self.store.active_devices(notification.user_id).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    error = %e,
                    "Device lookup failed"
                );
                return Delivery::Failed;
            }
        };

        // No devices: the notification still lands in the user's inbox.
        if devices.is_empty() {
            return Delivery::Sent;
        }

        let data = notification.push_data();
        let tokens: Vec<String> = devices.iter().map(|d| d.device_token.clone()).collect();
        let results = self
            .push
            .send_to_multiple(&tokens, &notification.title, &notification.body, data.as_ref())
            .await;

        let mut delivered = 0usize;
        for (device, (_, result)) in devices.iter().zip(results) {
            match result {
                Ok(message_id) => {
                    delivered += 1;
                    debug!(device_id = %device.id, %message_id, "Push delivered");
                }
                Err(e) => warn!(
                    notification_id = %notification.id,
                    device_id = %device.id,
                    error = %e,
                    "Push delivery failed"
                ),
            }
        }

        if delivered > 0 {
            Delivery::Sent
        } else {
            Delivery::Failed
        }
    }

    async fn record(&self, notification: &Notification, delivery: Delivery) {
        let result = match delivery {
            Delivery::Sent => self.store.mark_notification_sent(notification.id, Utc::now()).await,
            Delivery::Failed => self.store.mark_notification_failed(notification.id).await,
        };

        match result {
            Ok(true) => {
                metrics::counter!("notifications_dispatched_total", "status" => delivery.as_str())
                    .increment(1);
            }
            Ok(false) => debug!(
                notification_id = %notification.id,
                "Notification no longer pending, status left unchanged"
            ),
            Err(e) => error!(
                notification_id = %notification.id,
                status = delivery.as_str(),
                error = %e,
                "Failed to record delivery status"
            ),
        }
    }
}

#[async_trait]
impl Job for NotificationDispatchJob {
    fn name(&self) -> &'static str {
        "notification_dispatch"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let due = self
            .store
            .pending_notifications(Utc::now(), self.batch_size)
            .await?;

        if due.is_empty() {
            return Ok(());
        }

        let mut sent = 0usize;
        let mut failed = 0usize;
        for notification in &due {
            ctx.checkpoint()?;

            let delivery = self.deliver(notification).await;
            match delivery {
                Delivery::Sent => sent += 1,
                Delivery::Failed => failed += 1,
            }
            self.record(notification, delivery).await;
        }

        info!(sent, failed, "Notification dispatch pass complete");
        Ok(())
    }
}
