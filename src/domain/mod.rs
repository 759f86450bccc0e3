//! Domain types for title tracking with strong typing.
//!
//! This module provides type-safe wrappers and domain primitives shared by the
//! reconciliation and scheduling subsystems. It follows the Newtype pattern to
//! prevent mixing title ids with user ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a Title in the local catalog.
///
/// This is the internal surrogate key, never a provider id. Provider ids live
/// on the title record itself (`tmdb_id`, `imdb_id`, `tvdb_id`).
///
/// # Examples
///
/// ```rust
/// use bingebeacon::domain::TitleId;
///
/// let id = TitleId::new();
/// let parsed: TitleId = id.to_string().parse().unwrap();
/// assert_eq!(parsed, id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(Uuid);

impl TitleId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying uuid.
    #[must_use]
    pub const fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for TitleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TitleId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<TitleId> for Uuid {
    fn from(id: TitleId) -> Self {
        id.0
    }
}

impl FromStr for TitleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier for a user. Users themselves are managed elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of title tracked in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    #[default]
    Series,
    Movie,
}

impl TitleKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Movie => "movie",
        }
    }

    /// Parses the stored column value. Unknown values fall back to `Series`,
    /// which is what the catalog creates by default.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "movie" => Self::Movie,
            _ => Self::Series,
        }
    }
}

impl fmt::Display for TitleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of a notification.
///
/// Transitions are monotone: `Pending` moves to `Sent` or `Failed` through the
/// dispatch job, and only a user action moves a delivered notification to `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

impl NotificationStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "read" => Ok(Self::Read),
            other => Err(anyhow::anyhow!("Unknown notification status: {other}")),
        }
    }
}

/// Kind of derived timeline record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    NewEpisode,
}

impl TimelineEventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewEpisode => "new_episode",
        }
    }
}

impl fmt::Display for TimelineEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_id_round_trips_through_display() {
        let id = TitleId::new();
        let parsed: TitleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TitleId>().is_err());
    }

    #[test]
    fn title_id_serializes_as_plain_uuid() {
        let id = TitleId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn title_kind_unknown_falls_back_to_series() {
        assert_eq!(TitleKind::from_db("movie"), TitleKind::Movie);
        assert_eq!(TitleKind::from_db("tv"), TitleKind::Series);
        assert_eq!(TitleKind::Movie.to_string(), "movie");
    }

    #[test]
    fn notification_status_parses_known_values() {
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
            NotificationStatus::Read,
        ] {
            assert_eq!(status.as_str().parse::<NotificationStatus>().unwrap(), status);
        }
        assert!("queued".parse::<NotificationStatus>().is_err());
    }

    #[test]
    fn timeline_event_type_wire_name() {
        assert_eq!(TimelineEventType::NewEpisode.as_str(), "new_episode");
    }
}
