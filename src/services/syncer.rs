//! Title reconciliation across the catalog, enrichment and backfill providers.
//!
//! A reconciliation pulls the primary provider's view of a title, merges in
//! external ids, ratings and backfilled air dates, upserts seasons and
//! episodes, and appends a timeline event for each newly announced episode.
//! Only the initial title load, the primary detail fetch and the title write
//! are fatal. Every other step degrades to a log line and the run continues.

use crate::clients::{BackfillProvider, CatalogProvider, EnrichmentProvider};
use crate::db::Store;
use crate::domain::{TitleId, TitleKind};
use crate::models::episode::{EpisodeInput, SeasonInput};
use crate::models::provider::{SeasonDetail, SeasonSummary, TitleDetail};
use crate::models::timeline::NewTimelineEvent;
use crate::models::title::{RatingsSnapshot, Title, TitleSync};
use crate::models::is_future_date;
use crate::services::cache::CacheInvalidator;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use thiserror::Error;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Title {0} not found")]
    TitleNotFound(TitleId),

    #[error("Title {0} has no primary provider id")]
    MissingPrimaryId(TitleId),

    #[error("Primary provider error: {0:#}")]
    Provider(anyhow::Error),

    #[error("Database error: {0}")]
    Database(String),
}

impl SyncError {
    /// Retrying will not help until the underlying record changes.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::TitleNotFound(_) | Self::MissingPrimaryId(_))
    }

    fn database(e: &anyhow::Error) -> Self {
        Self::Database(format!("{e:#}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub seasons_synced: u32,
    pub seasons_failed: u32,
    pub episodes_created: u32,
    pub episodes_updated: u32,
    pub timeline_events_created: u32,
    pub episodes_backfilled: u32,
    pub enrichment_applied: bool,
}

/// An episode stored without an air date, waiting for backfill.
#[derive(Debug, Clone)]
struct PendingAirDate {
    episode_id: Uuid,
    season_number: i32,
    episode_number: i32,
    created: bool,
    overview: Option<String>,
}

pub struct Syncer {
    store: Store,
    catalog: Arc<dyn CatalogProvider>,
    enrichment: Option<Arc<dyn EnrichmentProvider>>,
    backfill: Option<Arc<dyn BackfillProvider>>,
    backfill_season_type: String,
    backfill_language: String,
    invalidator: CacheInvalidator,
    in_flight: std::sync::Mutex<HashMap<TitleId, Arc<tokio::sync::Mutex<()>>>>,
    span: Span,
}

impl Syncer {
    #[must_use]
    pub fn new(
        store: Store,
        catalog: Arc<dyn CatalogProvider>,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            store,
            catalog,
            enrichment: None,
            backfill: None,
            backfill_season_type: "default".to_string(),
            backfill_language: "eng".to_string(),
            invalidator,
            in_flight: std::sync::Mutex::new(HashMap::new()),
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_enrichment(mut self, provider: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichment = Some(provider);
        self
    }

    #[must_use]
    pub fn with_backfill(
        mut self,
        provider: Arc<dyn BackfillProvider>,
        season_type: &str,
        language: &str,
    ) -> Self {
        self.backfill = Some(provider);
        self.backfill_season_type = season_type.to_string();
        self.backfill_language = language.to_string();
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn title_lock(&self, title_id: TitleId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(title_id).or_default())
    }

    fn release_title_lock(&self, title_id: TitleId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference lives in the map, the other is ours.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(&title_id);
        }
    }

    /// Reconciles one title. Runs for the same title are serialized.
    pub async fn reconcile(&self, title_id: TitleId) -> Result<SyncReport, SyncError> {
        let lock = self.title_lock(title_id);
        let result = {
            let _guard = lock.lock().await;
            let span = info_span!(parent: &self.span, "reconcile", %title_id);
            self.reconcile_locked(title_id).instrument(span).await
        };
        self.release_title_lock(title_id, lock);

        metrics::counter!("sync_runs_total").increment(1);
        if result.is_err() {
            metrics::counter!("sync_failures_total").increment(1);
        }
        result
    }

    async fn reconcile_locked(&self, title_id: TitleId) -> Result<SyncReport, SyncError> {
        let title = self
            .store
            .get_title(title_id)
            .await
            .map_err(|e| SyncError::database(&e))?
            .ok_or(SyncError::TitleNotFound(title_id))?;
        let tmdb_id = title.tmdb_id.ok_or(SyncError::MissingPrimaryId(title_id))?;

        let detail = match title.kind {
            TitleKind::Series => self.catalog.title_detail(tmdb_id).await,
            TitleKind::Movie => self.catalog.movie_detail(tmdb_id).await,
        }
        .map_err(SyncError::Provider)?;

        let mut report = SyncReport::default();
        let sync = self.merge_title(&title, tmdb_id, &detail, &mut report).await;
        self.store
            .apply_title_sync(title_id, &sync)
            .await
            .map_err(|e| SyncError::database(&e))?;

        let tvdb_id = sync.tvdb_id.or(title.tvdb_id);
        let mut pending = Vec::new();

        // Movies have no season or episode rows.
        let seasons: &[SeasonSummary] = match title.kind {
            TitleKind::Series => detail.seasons.as_slice(),
            TitleKind::Movie => &[],
        };

        for summary in seasons {
            let season_number = summary.season_number;
            let season = match self.catalog.season_detail(tmdb_id, season_number).await {
                Ok(season) => season,
                Err(e) => {
                    error!(%title_id, season = season_number, error = %e, "Failed to fetch season");
                    report.seasons_failed += 1;
                    continue;
                }
            };

            match self
                .sync_season(&title, &sync.name, summary.episode_count, &season, &mut report, &mut pending)
                .await
            {
                Ok(()) => report.seasons_synced += 1,
                Err(e) => {
                    error!(%title_id, season = season_number, error = %e, "Failed to store season");
                    report.seasons_failed += 1;
                }
            }
        }

        if !pending.is_empty() {
            self.backfill_air_dates(&title, &sync.name, tvdb_id, &pending, &mut report)
                .await;
        }

        if let Err(e) = self.invalidator.invalidate_title(title_id).await {
            warn!(%title_id, error = %e, "Cache invalidation failed");
        }

        info!(
            %title_id,
            seasons = report.seasons_synced,
            seasons_failed = report.seasons_failed,
            episodes_created = report.episodes_created,
            timeline_events = report.timeline_events_created,
            "Title reconciled"
        );
        Ok(report)
    }

    /// Builds the title write from the primary detail plus whatever the
    /// external id and enrichment lookups managed to return.
    async fn merge_title(
        &self,
        title: &Title,
        tmdb_id: i32,
        detail: &TitleDetail,
        report: &mut SyncReport,
    ) -> TitleSync {
        let mut imdb_id = None;
        let mut tvdb_id = None;

        match title.kind {
            TitleKind::Movie => {
                imdb_id = detail.imdb_id.clone().filter(|id| !id.trim().is_empty());
            }
            TitleKind::Series => match self.catalog.external_ids(tmdb_id).await {
                Ok(ids) => {
                    imdb_id = ids.imdb_id.filter(|id| !id.trim().is_empty());
                    tvdb_id = ids.tvdb_id;
                }
                Err(e) => warn!(title_id = %title.id, error = %e, "Failed to fetch external ids"),
            },
        }

        let effective_imdb = imdb_id
            .clone()
            .or_else(|| title.enrichment_key().map(str::to_string));

        let mut ratings = None;
        if let (Some(provider), Some(imdb)) = (&self.enrichment, effective_imdb.as_deref()) {
            match provider.enrichment(imdb).await {
                Ok(enrichment) => {
                    let snapshot = RatingsSnapshot::from_enrichment(&enrichment, Utc::now());
                    match serde_json::to_string(&snapshot) {
                        Ok(json) => {
                            ratings = Some(json);
                            report.enrichment_applied = true;
                        }
                        Err(e) => warn!(title_id = %title.id, error = %e, "Failed to encode ratings"),
                    }
                }
                Err(e) => warn!(title_id = %title.id, imdb_id = imdb, error = %e, "Enrichment failed"),
            }
        }

        let name = if detail.name.trim().is_empty() {
            title.name.clone()
        } else {
            detail.name.clone()
        };

        TitleSync {
            name,
            overview: detail.overview.clone(),
            poster_url: detail.poster_path.clone(),
            backdrop_url: detail.backdrop_path.clone(),
            status: detail.status.clone(),
            genres: detail.genres.clone(),
            network: detail.networks.first().cloned(),
            premiere_date: detail.first_air_date,
            imdb_id,
            tvdb_id,
            ratings,
            synced_at: Utc::now(),
        }
    }

    async fn sync_season(
        &self,
        title: &Title,
        title_name: &str,
        episode_count: Option<i32>,
        season: &SeasonDetail,
        report: &mut SyncReport,
        pending: &mut Vec<PendingAirDate>,
    ) -> anyhow::Result<()> {
        let season_id = self
            .store
            .upsert_season(&SeasonInput {
                title_id: title.id,
                season_number: season.season_number,
                name: season.name.clone(),
                overview: season.overview.clone(),
                poster_url: season.poster_path.clone(),
                air_date: season.air_date,
                episode_count: episode_count
                    .or_else(|| i32::try_from(season.episodes.len()).ok()),
                tmdb_id: Some(season.id),
            })
            .await?;

        let now = Utc::now();
        for episode in &season.episodes {
            let upsert = match self
                .store
                .upsert_episode(&EpisodeInput {
                    title_id: title.id,
                    season_id,
                    season_number: season.season_number,
                    episode_number: episode.episode_number,
                    name: episode.name.clone(),
                    overview: episode.overview.clone(),
                    air_date: episode.air_date,
                    runtime_minutes: episode.runtime_minutes,
                    still_url: episode.still_path.clone(),
                    tmdb_id: Some(episode.id),
                })
                .await
            {
                Ok(upsert) => upsert,
                Err(e) => {
                    error!(
                        title_id = %title.id,
                        season = season.season_number,
                        episode = episode.episode_number,
                        error = %e,
                        "Failed to store episode"
                    );
                    continue;
                }
            };

            if upsert.created {
                report.episodes_created += 1;
            } else {
                report.episodes_updated += 1;
            }

            match episode.air_date {
                Some(air_date) => {
                    if upsert.created && is_future_date(air_date, now) {
                        self.emit_new_episode(
                            title,
                            title_name,
                            season.season_number,
                            episode.episode_number,
                            upsert.id,
                            air_date,
                            episode.overview.clone(),
                            report,
                        )
                        .await;
                    }
                }
                None => pending.push(PendingAirDate {
                    episode_id: upsert.id,
                    season_number: season.season_number,
                    episode_number: episode.episode_number,
                    created: upsert.created,
                    overview: episode.overview.clone(),
                }),
            }
        }

        Ok(())
    }

    async fn backfill_air_dates(
        &self,
        title: &Title,
        title_name: &str,
        tvdb_id: Option<i32>,
        pending: &[PendingAirDate],
        report: &mut SyncReport,
    ) {
        let (Some(provider), Some(tvdb_id)) = (&self.backfill, tvdb_id) else {
            debug!(
                title_id = %title.id,
                unresolved = pending.len(),
                "No backfill source, episodes stay without air date"
            );
            return;
        };

        let table = match provider
            .episodes(tvdb_id, &self.backfill_season_type, &self.backfill_language)
            .await
        {
            Ok(table) => table,
            Err(e) => {
                warn!(title_id = %title.id, tvdb_id, error = %e, "Backfill fetch failed");
                return;
            }
        };

        let dates: HashMap<(i32, i32), NaiveDate> = table
            .into_iter()
            .filter_map(|e| e.aired.map(|d| ((e.season_number, e.episode_number), d)))
            .collect();

        let now = Utc::now();
        for entry in pending {
            let Some(&air_date) = dates.get(&(entry.season_number, entry.episode_number)) else {
                continue;
            };

            match self
                .store
                .set_episode_air_date(title.id, entry.season_number, entry.episode_number, air_date)
                .await
            {
                Ok(Some(_)) => report.episodes_backfilled += 1,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        title_id = %title.id,
                        season = entry.season_number,
                        episode = entry.episode_number,
                        error = %e,
                        "Failed to store backfilled air date"
                    );
                    continue;
                }
            }

            if entry.created && is_future_date(air_date, now) {
                self.emit_new_episode(
                    title,
                    title_name,
                    entry.season_number,
                    entry.episode_number,
                    entry.episode_id,
                    air_date,
                    entry.overview.clone(),
                    report,
                )
                .await;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_new_episode(
        &self,
        title: &Title,
        title_name: &str,
        season_number: i32,
        episode_number: i32,
        episode_id: Uuid,
        air_date: NaiveDate,
        description: Option<String>,
        report: &mut SyncReport,
    ) {
        let event = NewTimelineEvent::new_episode(
            title.id,
            title_name,
            season_number,
            episode_number,
            episode_id,
            air_date,
            description,
        );

        match self.store.create_timeline_event(&event).await {
            Ok(true) => {
                report.timeline_events_created += 1;
                metrics::counter!("timeline_events_created_total").increment(1);
            }
            Ok(false) => debug!(episode_id = %episode_id, "Timeline event already recorded"),
            Err(e) => warn!(
                title_id = %title.id,
                season = season_number,
                episode = episode_number,
                error = %e,
                "Failed to create timeline event"
            ),
        }
    }
}
