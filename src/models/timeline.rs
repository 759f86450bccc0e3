use crate::domain::{TimelineEventType, TitleId};
use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewTimelineEvent {
    pub title_id: TitleId,
    pub event_type: TimelineEventType,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub episode_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

impl NewTimelineEvent {
    /// Event for an episode announced with a future air date.
    #[must_use]
    pub fn new_episode(
        title_id: TitleId,
        title_name: &str,
        season_number: i32,
        episode_number: i32,
        episode_id: Uuid,
        air_date: NaiveDate,
        description: Option<String>,
    ) -> Self {
        Self {
            title_id,
            event_type: TimelineEventType::NewEpisode,
            title: episode_label(title_name, season_number, episode_number),
            description,
            event_date: air_date,
            season_number: Some(season_number),
            episode_number: Some(episode_number),
            episode_id: Some(episode_id),
            metadata: serde_json::json!({}),
        }
    }
}

/// `"<Title> - S01E02"`
#[must_use]
pub fn episode_label(title_name: &str, season_number: i32, episode_number: i32) -> String {
    format!("{title_name} - S{season_number:02}E{episode_number:02}")
}

#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub title_id: TitleId,
    pub event_type: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: String,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub episode_id: Option<Uuid>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_pads_season_and_episode() {
        assert_eq!(episode_label("Severance", 2, 7), "Severance - S02E07");
        assert_eq!(episode_label("Show", 12, 110), "Show - S12E110");
    }
}
