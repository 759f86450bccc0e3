use crate::domain::TitleId;
use crate::entities::{episodes, prelude::*, seasons};
use crate::models::episode::{EpisodeInput, EpisodeRecord, EpisodeUpsert, SeasonInput};
use crate::models::{format_date, now_timestamp, parse_date};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::{self, NotSet},
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Repository for seasons and episodes, keyed by their natural identifiers.
pub struct EpisodeRepository {
    conn: DatabaseConnection,
}

/// Writes a column only when the provider supplied a value.
fn populated<T>(value: Option<T>) -> ActiveValue<Option<T>>
where
    Option<T>: Into<sea_orm::Value>,
{
    match value {
        Some(v) => Set(Some(v)),
        None => NotSet,
    }
}

impl EpisodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_episode(m: episodes::Model) -> EpisodeRecord {
        EpisodeRecord {
            id: m.id,
            title_id: TitleId::from(m.title_id),
            season_id: m.season_id,
            season_number: m.season_number,
            episode_number: m.episode_number,
            name: m.name,
            overview: m.overview,
            air_date: m.air_date.as_deref().and_then(parse_date),
        }
    }

    // ========================================================================
    // Seasons
    // ========================================================================

    /// Inserts or updates the season for `(title_id, season_number)` and
    /// returns its id.
    pub async fn upsert_season(&self, input: &SeasonInput) -> Result<Uuid> {
        let now = now_timestamp();
        let active_model = seasons::ActiveModel {
            id: Set(Uuid::new_v4()),
            title_id: Set(input.title_id.value()),
            season_number: Set(input.season_number),
            name: Set(input.name.clone()),
            overview: Set(input.overview.clone()),
            poster_url: Set(input.poster_url.clone()),
            air_date: Set(input.air_date.map(format_date)),
            episode_count: Set(input.episode_count),
            tmdb_id: Set(input.tmdb_id),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let mut update_columns = vec![
            seasons::Column::Name,
            seasons::Column::Overview,
            seasons::Column::PosterUrl,
            seasons::Column::EpisodeCount,
            seasons::Column::TmdbId,
            seasons::Column::UpdatedAt,
        ];
        if input.air_date.is_some() {
            update_columns.push(seasons::Column::AirDate);
        }

        Seasons::insert(active_model)
            .on_conflict(
                OnConflict::columns([seasons::Column::TitleId, seasons::Column::SeasonNumber])
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        let row = Seasons::find()
            .filter(seasons::Column::TitleId.eq(input.title_id.value()))
            .filter(seasons::Column::SeasonNumber.eq(input.season_number))
            .one(&self.conn)
            .await?
            .with_context(|| {
                format!(
                    "Season {} of title {} missing after upsert",
                    input.season_number, input.title_id
                )
            })?;

        Ok(row.id)
    }

    pub async fn count_seasons(&self, title_id: TitleId) -> Result<u64> {
        let count = Seasons::find()
            .filter(seasons::Column::TitleId.eq(title_id.value()))
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    // ========================================================================
    // Episodes
    // ========================================================================

    async fn find_row(
        &self,
        title_id: TitleId,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Option<episodes::Model>> {
        let row = Episodes::find()
            .filter(episodes::Column::TitleId.eq(title_id.value()))
            .filter(episodes::Column::SeasonNumber.eq(season_number))
            .filter(episodes::Column::EpisodeNumber.eq(episode_number))
            .one(&self.conn)
            .await?;
        Ok(row)
    }

    async fn update_existing(&self, id: Uuid, input: &EpisodeInput) -> Result<()> {
        let active_model = episodes::ActiveModel {
            season_id: Set(input.season_id),
            name: populated(input.name.clone()),
            overview: populated(input.overview.clone()),
            air_date: populated(input.air_date.map(format_date)),
            runtime_minutes: populated(input.runtime_minutes),
            still_url: populated(input.still_url.clone()),
            tmdb_id: populated(input.tmdb_id),
            updated_at: Set(now_timestamp()),
            ..Default::default()
        };

        Episodes::update_many()
            .set(active_model)
            .filter(episodes::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Upserts the episode by `(title_id, season_number, episode_number)`.
    ///
    /// `created` is true only when this call inserted the row. Fields the
    /// provider left empty never clear stored values.
    pub async fn upsert_episode(&self, input: &EpisodeInput) -> Result<EpisodeUpsert> {
        if let Some(row) = self
            .find_row(input.title_id, input.season_number, input.episode_number)
            .await?
        {
            self.update_existing(row.id, input).await?;
            return Ok(EpisodeUpsert {
                id: row.id,
                created: false,
            });
        }

        let id = Uuid::new_v4();
        let now = now_timestamp();
        let active_model = episodes::ActiveModel {
            id: Set(id),
            title_id: Set(input.title_id.value()),
            season_id: Set(input.season_id),
            season_number: Set(input.season_number),
            episode_number: Set(input.episode_number),
            name: Set(input.name.clone()),
            overview: Set(input.overview.clone()),
            air_date: Set(input.air_date.map(format_date)),
            runtime_minutes: Set(input.runtime_minutes),
            still_url: Set(input.still_url.clone()),
            tmdb_id: Set(input.tmdb_id),
            tvdb_id: Set(None),
            imdb_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let inserted = Episodes::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    episodes::Column::TitleId,
                    episodes::Column::SeasonNumber,
                    episodes::Column::EpisodeNumber,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        if inserted > 0 {
            return Ok(EpisodeUpsert { id, created: true });
        }

        // Lost a race with a concurrent insert of the same key.
        let row = self
            .find_row(input.title_id, input.season_number, input.episode_number)
            .await?
            .with_context(|| {
                format!(
                    "Episode S{}E{} of title {} missing after conflicting insert",
                    input.season_number, input.episode_number, input.title_id
                )
            })?;
        self.update_existing(row.id, input).await?;
        Ok(EpisodeUpsert {
            id: row.id,
            created: false,
        })
    }

    /// Stores a backfilled air date. Returns the episode id when the row exists.
    pub async fn set_air_date(
        &self,
        title_id: TitleId,
        season_number: i32,
        episode_number: i32,
        air_date: NaiveDate,
    ) -> Result<Option<Uuid>> {
        let Some(row) = self.find_row(title_id, season_number, episode_number).await? else {
            return Ok(None);
        };

        let active_model = episodes::ActiveModel {
            air_date: Set(Some(format_date(air_date))),
            updated_at: Set(now_timestamp()),
            ..Default::default()
        };

        Episodes::update_many()
            .set(active_model)
            .filter(episodes::Column::Id.eq(row.id))
            .exec(&self.conn)
            .await?;

        Ok(Some(row.id))
    }

    pub async fn get_episode(
        &self,
        title_id: TitleId,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Option<EpisodeRecord>> {
        Ok(self
            .find_row(title_id, season_number, episode_number)
            .await?
            .map(Self::map_episode))
    }

    pub async fn list_for_title(&self, title_id: TitleId) -> Result<Vec<EpisodeRecord>> {
        let rows = Episodes::find()
            .filter(episodes::Column::TitleId.eq(title_id.value()))
            .order_by_asc(episodes::Column::SeasonNumber)
            .order_by_asc(episodes::Column::EpisodeNumber)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_episode).collect())
    }
}
