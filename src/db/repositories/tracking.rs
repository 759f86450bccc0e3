use crate::domain::{TitleId, UserId};
use crate::entities::{prelude::*, tracked_titles};
use crate::models::now_timestamp;
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use uuid::Uuid;

/// Which users follow which titles.
pub struct TrackingRepository {
    conn: DatabaseConnection,
}

impl TrackingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns `true` when the user was not already following the title.
    pub async fn track(&self, user_id: UserId, title_id: TitleId) -> Result<bool> {
        let active_model = tracked_titles::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.value()),
            title_id: Set(title_id.value()),
            created_at: Set(now_timestamp()),
        };

        let inserted = TrackedTitles::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    tracked_titles::Column::UserId,
                    tracked_titles::Column::TitleId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(inserted > 0)
    }

    pub async fn untrack(&self, user_id: UserId, title_id: TitleId) -> Result<bool> {
        let result = TrackedTitles::delete_many()
            .filter(tracked_titles::Column::UserId.eq(user_id.value()))
            .filter(tracked_titles::Column::TitleId.eq(title_id.value()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Every title followed by at least one user, each listed once.
    pub async fn distinct_title_ids(&self) -> Result<Vec<TitleId>> {
        let ids: Vec<Uuid> = TrackedTitles::find()
            .select_only()
            .column(tracked_titles::Column::TitleId)
            .distinct()
            .order_by_asc(tracked_titles::Column::TitleId)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(ids.into_iter().map(TitleId::from).collect())
    }
}
