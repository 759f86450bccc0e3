#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bingebeacon::clients::{BackfillProvider, CatalogProvider, EnrichmentProvider, PushProvider};
use bingebeacon::db::Store;
use bingebeacon::models::provider::{
    BackfillEpisode, EnrichmentDetail, EpisodeDetail, ExternalIds, SeasonDetail, SeasonSummary,
    TitleDetail,
};
use bingebeacon::services::{CacheInvalidator, StoreCache, Syncer};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct TestDb {
    pub store: Store,
    path: PathBuf,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub async fn test_db(prefix: &str) -> TestDb {
    let path = std::env::temp_dir().join(format!("bingebeacon-{prefix}-{}.db", uuid::Uuid::new_v4()));
    let store = Store::new(&format!("sqlite:{}", path.display()))
        .await
        .expect("Failed to open test database");
    TestDb { store, path }
}

pub fn episode(number: i32, air_date: Option<NaiveDate>) -> EpisodeDetail {
    EpisodeDetail {
        id: 1000 + number,
        episode_number: number,
        name: Some(format!("Episode {number}")),
        overview: Some(format!("Overview {number}")),
        air_date,
        runtime_minutes: Some(45),
        still_path: None,
    }
}

pub fn season(number: i32, episodes: Vec<EpisodeDetail>) -> SeasonDetail {
    SeasonDetail {
        id: 500 + number,
        season_number: number,
        name: Some(format!("Season {number}")),
        overview: None,
        poster_path: None,
        air_date: None,
        episodes,
    }
}

pub fn title_detail(id: i32, name: &str, season_numbers: &[i32]) -> TitleDetail {
    TitleDetail {
        id,
        name: name.to_string(),
        overview: Some("A show".to_string()),
        poster_path: Some("/poster.jpg".to_string()),
        backdrop_path: None,
        status: Some("Returning Series".to_string()),
        first_air_date: NaiveDate::from_ymd_opt(2020, 1, 1),
        genres: vec!["Drama".to_string()],
        networks: vec!["HBO".to_string(), "Max".to_string()],
        seasons: season_numbers
            .iter()
            .map(|&n| SeasonSummary {
                season_number: n,
                name: None,
                episode_count: None,
            })
            .collect(),
        imdb_id: None,
    }
}

#[derive(Default)]
struct CatalogState {
    detail: Option<TitleDetail>,
    movie: Option<TitleDetail>,
    seasons: HashMap<i32, SeasonDetail>,
    external_ids: Option<ExternalIds>,
}

/// Scripted primary provider. Missing entries behave as provider errors.
/// `detail_calls` counts series detail lookups only.
#[derive(Default)]
pub struct StubCatalog {
    state: Mutex<CatalogState>,
    pub detail_calls: AtomicUsize,
}

impl StubCatalog {
    pub fn new(detail: TitleDetail) -> Self {
        let stub = Self::default();
        stub.set_detail(Some(detail));
        stub
    }

    pub fn set_detail(&self, detail: Option<TitleDetail>) {
        self.state.lock().unwrap().detail = detail;
    }

    pub fn set_movie(&self, detail: Option<TitleDetail>) {
        self.state.lock().unwrap().movie = detail;
    }

    pub fn set_season(&self, season: SeasonDetail) {
        self.state
            .lock()
            .unwrap()
            .seasons
            .insert(season.season_number, season);
    }

    pub fn remove_season(&self, number: i32) {
        self.state.lock().unwrap().seasons.remove(&number);
    }

    pub fn set_external_ids(&self, ids: Option<ExternalIds>) {
        self.state.lock().unwrap().external_ids = ids;
    }

    pub fn calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for StubCatalog {
    async fn title_detail(&self, tmdb_id: i32) -> Result<TitleDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .detail
            .clone()
            .ok_or_else(|| anyhow!("title {tmdb_id} unavailable"))
    }

    async fn movie_detail(&self, tmdb_id: i32) -> Result<TitleDetail> {
        self.state
            .lock()
            .unwrap()
            .movie
            .clone()
            .ok_or_else(|| anyhow!("movie {tmdb_id} unavailable"))
    }

    async fn season_detail(&self, tmdb_id: i32, season_number: i32) -> Result<SeasonDetail> {
        self.state
            .lock()
            .unwrap()
            .seasons
            .get(&season_number)
            .cloned()
            .ok_or_else(|| anyhow!("season {season_number} of {tmdb_id} unavailable"))
    }

    async fn external_ids(&self, tmdb_id: i32) -> Result<ExternalIds> {
        self.state
            .lock()
            .unwrap()
            .external_ids
            .clone()
            .ok_or_else(|| anyhow!("external ids of {tmdb_id} unavailable"))
    }
}

pub struct StubEnrichment {
    pub detail: Option<EnrichmentDetail>,
    pub requested: Mutex<Vec<String>>,
}

#[async_trait]
impl EnrichmentProvider for StubEnrichment {
    async fn enrichment(&self, imdb_id: &str) -> Result<EnrichmentDetail> {
        self.requested.lock().unwrap().push(imdb_id.to_string());
        self.detail.clone().ok_or_else(|| anyhow!("Incorrect IMDb ID."))
    }
}

pub struct StubBackfill {
    pub episodes: Vec<BackfillEpisode>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl BackfillProvider for StubBackfill {
    async fn episodes(
        &self,
        _tvdb_id: i32,
        _season_type: &str,
        _language: &str,
    ) -> Result<Vec<BackfillEpisode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.episodes.clone())
    }
}

/// Push stub that fails for the listed tokens and records every attempt.
#[derive(Default)]
pub struct StubPush {
    pub failing: HashSet<String>,
    pub attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl PushProvider for StubPush {
    async fn send_to_device(
        &self,
        device_token: &str,
        _title: &str,
        _body: &str,
        _data: Option<&HashMap<String, String>>,
    ) -> Result<String> {
        self.attempts.lock().unwrap().push(device_token.to_string());
        if self.failing.contains(device_token) {
            Err(anyhow!("UNREGISTERED"))
        } else {
            Ok(format!("projects/demo/messages/{device_token}"))
        }
    }
}

pub fn syncer(store: &Store, catalog: Arc<StubCatalog>) -> Syncer {
    let invalidator = CacheInvalidator::new(Arc::new(StoreCache::new(store.clone())));
    Syncer::new(store.clone(), catalog, invalidator)
}
