use crate::clients::fcm::FcmClient;
use crate::clients::omdb::OmdbClient;
use crate::clients::thetvdb::ThetvdbClient;
use crate::clients::tmdb::TmdbClient;
use crate::clients::{DisabledPush, PushProvider};
use crate::config::Config;
use crate::db::Store;
use crate::scheduler::Scheduler;
use crate::scheduler::jobs::{EpisodeSyncJob, NotificationDispatchJob, StaleCleanupJob};
use crate::services::{CacheBackend, CacheInvalidator, StoreCache, Syncer};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Long-lived services shared by the CLI commands and the daemon.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub cache: Arc<dyn CacheBackend>,
    pub syncer: Arc<Syncer>,
    pub push: Arc<dyn PushProvider>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let cache: Arc<dyn CacheBackend> = Arc::new(StoreCache::new(store.clone()));
        let invalidator = CacheInvalidator::new(Arc::clone(&cache)).with_span(info_span!("cache"));

        let catalog = Arc::new(TmdbClient::new(&config.tmdb)?);
        let mut syncer = Syncer::new(store.clone(), catalog, invalidator)
            .with_span(info_span!("syncer"));

        if config.omdb.api_key.is_empty() {
            info!("OMDb API key not set, ratings enrichment disabled");
        } else {
            syncer = syncer.with_enrichment(Arc::new(OmdbClient::new(&config.omdb)?));
        }

        if config.thetvdb.api_key.is_empty() {
            info!("TheTVDB API key not set, air date backfill disabled");
        } else {
            syncer = syncer.with_backfill(
                Arc::new(ThetvdbClient::new(&config.thetvdb)?),
                &config.thetvdb.season_type,
                &config.thetvdb.language,
            );
        }

        let push: Arc<dyn PushProvider> = if config.fcm.is_configured() {
            Arc::new(FcmClient::new(&config.fcm)?)
        } else {
            warn!("FCM not configured, push delivery disabled");
            Arc::new(DisabledPush)
        };

        Ok(Self {
            config,
            store,
            cache,
            syncer: Arc::new(syncer),
            push,
        })
    }

    /// Scheduler with every recurring job registered but not started.
    #[must_use]
    pub fn build_scheduler(&self) -> Scheduler {
        let s = &self.config.scheduler;
        let mut scheduler = Scheduler::new(s.job_timeout()).with_span(info_span!("scheduler"));

        scheduler.register(Arc::new(EpisodeSyncJob::new(
            self.store.clone(),
            Arc::clone(&self.syncer),
            s.episode_sync_interval(),
            s.title_delay(),
        )));
        scheduler.register(Arc::new(NotificationDispatchJob::new(
            self.store.clone(),
            Arc::clone(&self.push),
            s.dispatch_interval(),
            s.dispatch_batch_size,
        )));
        scheduler.register(Arc::new(StaleCleanupJob::new(
            self.store.clone(),
            s.cleanup_interval(),
            s.read_retention_days,
        )));

        scheduler
    }
}
