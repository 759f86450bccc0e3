use crate::domain::TitleId;
use crate::entities::{prelude::*, timeline_events};
use crate::models::timeline::{NewTimelineEvent, TimelineEvent};
use crate::models::{format_date, now_timestamp};
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

pub struct TimelineRepository {
    conn: DatabaseConnection,
}

impl TimelineRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Appends an event. Returns `false` when an event of the same type
    /// already exists for the episode.
    pub async fn create(&self, event: &NewTimelineEvent) -> Result<bool> {
        let active_model = timeline_events::ActiveModel {
            id: Set(Uuid::new_v4()),
            title_id: Set(event.title_id.value()),
            event_type: Set(event.event_type.as_str().to_string()),
            title: Set(event.title.clone()),
            description: Set(event.description.clone()),
            event_date: Set(format_date(event.event_date)),
            season_number: Set(event.season_number),
            episode_number: Set(event.episode_number),
            episode_id: Set(event.episode_id),
            metadata: Set(event.metadata.to_string()),
            created_at: Set(now_timestamp()),
        };

        let inserted = TimelineEvents::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    timeline_events::Column::EpisodeId,
                    timeline_events::Column::EventType,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(inserted > 0)
    }

    pub async fn list_for_title(&self, title_id: TitleId) -> Result<Vec<TimelineEvent>> {
        let rows = TimelineEvents::find()
            .filter(timeline_events::Column::TitleId.eq(title_id.value()))
            .order_by_asc(timeline_events::Column::EventDate)
            .order_by_asc(timeline_events::Column::CreatedAt)
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| TimelineEvent {
                id: m.id,
                title_id: TitleId::from(m.title_id),
                event_type: m.event_type,
                title: m.title,
                description: m.description,
                event_date: m.event_date,
                season_number: m.season_number,
                episode_number: m.episode_number,
                episode_id: m.episode_id,
                created_at: m.created_at,
            })
            .collect())
    }
}
