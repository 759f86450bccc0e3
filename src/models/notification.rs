use crate::domain::{NotificationStatus, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub timeline_event_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    pub scheduled_for: String,
    pub sent_at: Option<String>,
    pub read_at: Option<String>,
}

impl Notification {
    /// Flattens the payload object into the string map push providers accept.
    /// Non-string values are sent as their JSON text.
    #[must_use]
    pub fn push_data(&self) -> Option<HashMap<String, String>> {
        let object = self.payload.as_object()?;
        if object.is_empty() {
            return None;
        }

        let data = object
            .iter()
            .map(|(k, v)| {
                let value = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                (k.clone(), value)
            })
            .collect();
        Some(data)
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub timeline_event_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Device {
    pub id: Uuid,
    pub user_id: UserId,
    pub device_token: String,
    pub platform: String,
    pub is_active: bool,
}
