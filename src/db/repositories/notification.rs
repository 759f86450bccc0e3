use crate::domain::{NotificationStatus, UserId};
use crate::entities::{notifications, prelude::*, user_devices};
use crate::models::notification::{Device, NewNotification, Notification};
use crate::models::{now_timestamp, timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::warn;
use uuid::Uuid;

/// Notifications and the device registry they are delivered to.
pub struct NotificationRepository {
    conn: DatabaseConnection,
}

impl NotificationRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: notifications::Model) -> Notification {
        let status = m.status.parse().unwrap_or_else(|_| {
            warn!(notification_id = %m.id, status = %m.status, "Unknown notification status");
            NotificationStatus::Failed
        });

        Notification {
            id: m.id,
            user_id: UserId::from_uuid(m.user_id),
            timeline_event_id: m.timeline_event_id,
            title: m.title,
            body: m.body,
            payload: serde_json::from_str(&m.payload).unwrap_or_else(|_| serde_json::json!({})),
            status,
            scheduled_for: m.scheduled_for,
            sent_at: m.sent_at,
            read_at: m.read_at,
        }
    }

    pub async fn create(&self, notification: &NewNotification) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let active_model = notifications::ActiveModel {
            id: Set(id),
            user_id: Set(notification.user_id.value()),
            timeline_event_id: Set(notification.timeline_event_id),
            title: Set(notification.title.clone()),
            body: Set(notification.body.clone()),
            payload: Set(notification.payload.to_string()),
            status: Set(NotificationStatus::Pending.as_str().to_string()),
            scheduled_for: Set(timestamp(notification.scheduled_for)),
            sent_at: Set(None),
            read_at: Set(None),
            created_at: Set(now_timestamp()),
        };

        Notifications::insert(active_model)
            .exec_without_returning(&self.conn)
            .await?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = Notifications::find_by_id(id).one(&self.conn).await?;
        Ok(row.map(Self::map_model))
    }

    /// Pending notifications due at or before `now`, oldest first.
    pub async fn pending_due(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Notification>> {
        let rows = Notifications::find()
            .filter(notifications::Column::Status.eq(NotificationStatus::Pending.as_str()))
            .filter(notifications::Column::ScheduledFor.lte(timestamp(now)))
            .order_by_asc(notifications::Column::ScheduledFor)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// Moves a pending notification to `sent`. Returns `false` if it was no
    /// longer pending.
    pub async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = Notifications::update_many()
            .col_expr(
                notifications::Column::Status,
                Expr::value(NotificationStatus::Sent.as_str()),
            )
            .col_expr(notifications::Column::SentAt, Expr::value(timestamp(sent_at)))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::Status.eq(NotificationStatus::Pending.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        let result = Notifications::update_many()
            .col_expr(
                notifications::Column::Status,
                Expr::value(NotificationStatus::Failed.as_str()),
            )
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::Status.eq(NotificationStatus::Pending.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// User acknowledged a delivered notification.
    pub async fn mark_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<bool> {
        let result = Notifications::update_many()
            .col_expr(
                notifications::Column::Status,
                Expr::value(NotificationStatus::Read.as_str()),
            )
            .col_expr(notifications::Column::ReadAt, Expr::value(timestamp(read_at)))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::Status.is_in([
                NotificationStatus::Sent.as_str(),
                NotificationStatus::Failed.as_str(),
            ]))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Deletes read notifications created before `cutoff`.
    pub async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = Notifications::delete_many()
            .filter(notifications::Column::Status.eq(NotificationStatus::Read.as_str()))
            .filter(notifications::Column::CreatedAt.lt(timestamp(cutoff)))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    // ========================================================================
    // Devices
    // ========================================================================

    pub async fn register_device(
        &self,
        user_id: UserId,
        device_token: &str,
        platform: &str,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let active_model = user_devices::ActiveModel {
            id: Set(id),
            user_id: Set(user_id.value()),
            device_token: Set(device_token.to_string()),
            platform: Set(platform.to_string()),
            is_active: Set(true),
            created_at: Set(now_timestamp()),
        };

        UserDevices::insert(active_model)
            .exec_without_returning(&self.conn)
            .await?;
        Ok(id)
    }

    pub async fn deactivate_device(&self, id: Uuid) -> Result<()> {
        UserDevices::update_many()
            .col_expr(user_devices::Column::IsActive, Expr::value(false))
            .filter(user_devices::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn active_devices(&self, user_id: UserId) -> Result<Vec<Device>> {
        let rows = UserDevices::find()
            .filter(user_devices::Column::UserId.eq(user_id.value()))
            .filter(user_devices::Column::IsActive.eq(true))
            .order_by_asc(user_devices::Column::CreatedAt)
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| Device {
                id: m.id,
                user_id: UserId::from_uuid(m.user_id),
                device_token: m.device_token,
                platform: m.platform,
                is_active: m.is_active,
            })
            .collect())
    }
}
