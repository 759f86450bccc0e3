use crate::domain::{TitleId, TitleKind};
use crate::entities::{prelude::*, titles};
use crate::models::title::{Title, TitleSync};
use crate::models::{format_date, now_timestamp, parse_date, timestamp};
use anyhow::{Result, bail};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

pub struct TitleRepository {
    conn: DatabaseConnection,
}

impl TitleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: titles::Model) -> Title {
        Title {
            id: TitleId::from(model.id),
            kind: TitleKind::from_db(&model.kind),
            name: model.name,
            overview: model.overview,
            poster_url: model.poster_url,
            backdrop_url: model.backdrop_url,
            status: model.status,
            genres: model
                .genres
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            network: model.network,
            premiere_date: model.premiere_date.as_deref().and_then(parse_date),
            tmdb_id: model.tmdb_id,
            imdb_id: model.imdb_id,
            tvdb_id: model.tvdb_id,
            last_synced_at: model.last_synced_at,
            sync_priority: model.sync_priority,
            ratings: model.ratings,
        }
    }

    pub async fn get(&self, id: TitleId) -> Result<Option<Title>> {
        let row = Titles::find_by_id(id.value()).one(&self.conn).await?;
        Ok(row.map(Self::map_model))
    }

    pub async fn find_by_tmdb(&self, tmdb_id: i32) -> Result<Option<Title>> {
        let row = Titles::find()
            .filter(titles::Column::TmdbId.eq(tmdb_id))
            .one(&self.conn)
            .await?;
        Ok(row.map(Self::map_model))
    }

    /// Returns the title for a primary-provider id, creating a placeholder row
    /// on first reference. The placeholder is filled in by reconciliation.
    pub async fn ensure_from_tmdb(&self, tmdb_id: i32, kind: TitleKind) -> Result<Title> {
        if let Some(existing) = self.find_by_tmdb(tmdb_id).await? {
            return Ok(existing);
        }

        let now = now_timestamp();
        let active_model = titles::ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(kind.as_str().to_string()),
            name: Set(format!("tmdb:{tmdb_id}")),
            overview: Set(None),
            poster_url: Set(None),
            backdrop_url: Set(None),
            status: Set(None),
            genres: Set(None),
            network: Set(None),
            premiere_date: Set(None),
            tmdb_id: Set(Some(tmdb_id)),
            imdb_id: Set(None),
            tvdb_id: Set(None),
            last_synced_at: Set(None),
            sync_priority: Set(0),
            ratings: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        Titles::insert(active_model)
            .on_conflict(
                OnConflict::column(titles::Column::TmdbId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        match self.find_by_tmdb(tmdb_id).await? {
            Some(title) => Ok(title),
            None => bail!("Title for tmdb id {tmdb_id} vanished after insert"),
        }
    }

    /// Column-level write of reconciled fields. Identifiers and ratings are
    /// only written when the sync produced a value for them.
    pub async fn apply_sync(&self, id: TitleId, sync: &TitleSync) -> Result<()> {
        let genres_json = serde_json::to_string(&sync.genres)?;
        let synced_at = timestamp(sync.synced_at);

        let active_model = titles::ActiveModel {
            name: Set(sync.name.clone()),
            overview: Set(sync.overview.clone()),
            poster_url: Set(sync.poster_url.clone()),
            backdrop_url: Set(sync.backdrop_url.clone()),
            status: Set(sync.status.clone()),
            genres: Set(Some(genres_json)),
            network: Set(sync.network.clone()),
            premiere_date: match sync.premiere_date {
                Some(date) => Set(Some(format_date(date))),
                None => NotSet,
            },
            imdb_id: match &sync.imdb_id {
                Some(imdb) => Set(Some(imdb.clone())),
                None => NotSet,
            },
            tvdb_id: match sync.tvdb_id {
                Some(tvdb) => Set(Some(tvdb)),
                None => NotSet,
            },
            ratings: match &sync.ratings {
                Some(ratings) => Set(Some(ratings.clone())),
                None => NotSet,
            },
            last_synced_at: Set(Some(synced_at.clone())),
            updated_at: Set(synced_at),
            ..Default::default()
        };

        let result = Titles::update_many()
            .set(active_model)
            .filter(titles::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            bail!("Title {id} not found for update");
        }

        Ok(())
    }
}
