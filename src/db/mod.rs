use crate::domain::{TitleId, TitleKind, UserId};
use crate::models::episode::{EpisodeInput, EpisodeRecord, EpisodeUpsert, SeasonInput};
use crate::models::notification::{Device, NewNotification, Notification};
use crate::models::timeline::{NewTimelineEvent, TimelineEvent};
use crate::models::title::{Title, TitleSync};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn title_repo(&self) -> repositories::title::TitleRepository {
        repositories::title::TitleRepository::new(self.conn.clone())
    }

    fn episode_repo(&self) -> repositories::episode::EpisodeRepository {
        repositories::episode::EpisodeRepository::new(self.conn.clone())
    }

    fn timeline_repo(&self) -> repositories::timeline::TimelineRepository {
        repositories::timeline::TimelineRepository::new(self.conn.clone())
    }

    fn notification_repo(&self) -> repositories::notification::NotificationRepository {
        repositories::notification::NotificationRepository::new(self.conn.clone())
    }

    fn tracking_repo(&self) -> repositories::tracking::TrackingRepository {
        repositories::tracking::TrackingRepository::new(self.conn.clone())
    }

    fn cache_repo(&self) -> repositories::cache::CacheRepository {
        repositories::cache::CacheRepository::new(self.conn.clone())
    }

    // ------------------------------------------------------------------
    // Titles
    // ------------------------------------------------------------------

    pub async fn get_title(&self, id: TitleId) -> Result<Option<Title>> {
        self.title_repo().get(id).await
    }

    pub async fn find_title_by_tmdb(&self, tmdb_id: i32) -> Result<Option<Title>> {
        self.title_repo().find_by_tmdb(tmdb_id).await
    }

    pub async fn ensure_title(&self, tmdb_id: i32, kind: TitleKind) -> Result<Title> {
        self.title_repo().ensure_from_tmdb(tmdb_id, kind).await
    }

    pub async fn apply_title_sync(&self, id: TitleId, sync: &TitleSync) -> Result<()> {
        self.title_repo().apply_sync(id, sync).await
    }

    // ------------------------------------------------------------------
    // Seasons & episodes
    // ------------------------------------------------------------------

    pub async fn upsert_season(&self, input: &SeasonInput) -> Result<Uuid> {
        self.episode_repo().upsert_season(input).await
    }

    pub async fn count_seasons(&self, title_id: TitleId) -> Result<u64> {
        self.episode_repo().count_seasons(title_id).await
    }

    pub async fn upsert_episode(&self, input: &EpisodeInput) -> Result<EpisodeUpsert> {
        self.episode_repo().upsert_episode(input).await
    }

    pub async fn set_episode_air_date(
        &self,
        title_id: TitleId,
        season_number: i32,
        episode_number: i32,
        air_date: NaiveDate,
    ) -> Result<Option<Uuid>> {
        self.episode_repo()
            .set_air_date(title_id, season_number, episode_number, air_date)
            .await
    }

    pub async fn get_episode(
        &self,
        title_id: TitleId,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Option<EpisodeRecord>> {
        self.episode_repo()
            .get_episode(title_id, season_number, episode_number)
            .await
    }

    pub async fn list_episodes(&self, title_id: TitleId) -> Result<Vec<EpisodeRecord>> {
        self.episode_repo().list_for_title(title_id).await
    }

    // ------------------------------------------------------------------
    // Timeline
    // ------------------------------------------------------------------

    pub async fn create_timeline_event(&self, event: &NewTimelineEvent) -> Result<bool> {
        self.timeline_repo().create(event).await
    }

    pub async fn list_timeline_events(&self, title_id: TitleId) -> Result<Vec<TimelineEvent>> {
        self.timeline_repo().list_for_title(title_id).await
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    pub async fn track_title(&self, user_id: UserId, title_id: TitleId) -> Result<bool> {
        self.tracking_repo().track(user_id, title_id).await
    }

    pub async fn untrack_title(&self, user_id: UserId, title_id: TitleId) -> Result<bool> {
        self.tracking_repo().untrack(user_id, title_id).await
    }

    pub async fn tracked_title_ids(&self) -> Result<Vec<TitleId>> {
        self.tracking_repo().distinct_title_ids().await
    }

    // ------------------------------------------------------------------
    // Notifications & devices
    // ------------------------------------------------------------------

    pub async fn create_notification(&self, notification: &NewNotification) -> Result<Uuid> {
        self.notification_repo().create(notification).await
    }

    pub async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        self.notification_repo().get(id).await
    }

    pub async fn pending_notifications(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Notification>> {
        self.notification_repo().pending_due(now, limit).await
    }

    pub async fn mark_notification_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        self.notification_repo().mark_sent(id, sent_at).await
    }

    pub async fn mark_notification_failed(&self, id: Uuid) -> Result<bool> {
        self.notification_repo().mark_failed(id).await
    }

    pub async fn mark_notification_read(&self, id: Uuid, read_at: DateTime<Utc>) -> Result<bool> {
        self.notification_repo().mark_read(id, read_at).await
    }

    pub async fn delete_read_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.notification_repo().delete_read_before(cutoff).await
    }

    pub async fn register_device(
        &self,
        user_id: UserId,
        device_token: &str,
        platform: &str,
    ) -> Result<Uuid> {
        self.notification_repo()
            .register_device(user_id, device_token, platform)
            .await
    }

    pub async fn deactivate_device(&self, id: Uuid) -> Result<()> {
        self.notification_repo().deactivate_device(id).await
    }

    pub async fn active_devices(&self, user_id: UserId) -> Result<Vec<Device>> {
        self.notification_repo().active_devices(user_id).await
    }

    // ------------------------------------------------------------------
    // View cache
    // ------------------------------------------------------------------

    pub async fn cache_get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.cache_repo().get(key, now).await
    }

    pub async fn cache_set(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.cache_repo().set(key, value, expires_at).await
    }

    pub async fn cache_delete(&self, key: &str) -> Result<u64> {
        self.cache_repo().delete(key).await
    }

    pub async fn cache_delete_matching(&self, pattern: &str) -> Result<u64> {
        self.cache_repo().delete_matching(pattern).await
    }

    pub async fn purge_expired_cache(&self, now: DateTime<Utc>) -> Result<u64> {
        self.cache_repo().purge_expired(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    async fn temp_store() -> (Store, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("bingebeacon-store-{}.db", Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        (store, path)
    }

    #[tokio::test]
    async fn ensure_title_is_idempotent() {
        let (store, path) = temp_store().await;

        let first = store.ensure_title(1399, TitleKind::Series).await.unwrap();
        let second = store.ensure_title(1399, TitleKind::Series).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.tmdb_id, Some(1399));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn apply_sync_keeps_ids_when_absent() {
        let (store, path) = temp_store().await;
        let title = store.ensure_title(7, TitleKind::Series).await.unwrap();

        let mut sync = TitleSync {
            name: "Seven".to_string(),
            overview: None,
            poster_url: None,
            backdrop_url: None,
            status: Some("Returning Series".to_string()),
            genres: vec!["Drama".to_string()],
            network: Some("HBO".to_string()),
            premiere_date: NaiveDate::from_ymd_opt(2011, 4, 17),
            imdb_id: Some("tt0944947".to_string()),
            tvdb_id: Some(121_361),
            ratings: None,
            synced_at: Utc::now(),
        };
        store.apply_title_sync(title.id, &sync).await.unwrap();

        sync.imdb_id = None;
        sync.tvdb_id = None;
        store.apply_title_sync(title.id, &sync).await.unwrap();

        let loaded = store.get_title(title.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Seven");
        assert_eq!(loaded.imdb_id.as_deref(), Some("tt0944947"));
        assert_eq!(loaded.tvdb_id, Some(121_361));
        assert_eq!(loaded.genres, vec!["Drama".to_string()]);
        assert!(loaded.last_synced_at.is_some());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn episode_upsert_preserves_known_air_date() {
        let (store, path) = temp_store().await;
        let title = store.ensure_title(42, TitleKind::Series).await.unwrap();

        let season_id = store
            .upsert_season(&SeasonInput {
                title_id: title.id,
                season_number: 1,
                name: Some("Season 1".to_string()),
                overview: None,
                poster_url: None,
                air_date: None,
                episode_count: Some(2),
                tmdb_id: None,
            })
            .await
            .unwrap();

        let mut input = EpisodeInput {
            title_id: title.id,
            season_id,
            season_number: 1,
            episode_number: 1,
            name: Some("Pilot".to_string()),
            overview: None,
            air_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            runtime_minutes: Some(50),
            still_url: None,
            tmdb_id: Some(11),
        };

        let first = store.upsert_episode(&input).await.unwrap();
        assert!(first.created);

        input.air_date = None;
        let second = store.upsert_episode(&input).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let stored = store.get_episode(title.id, 1, 1).await.unwrap().unwrap();
        assert_eq!(stored.air_date, NaiveDate::from_ymd_opt(2020, 1, 1));

        let season_again = store
            .upsert_season(&SeasonInput {
                title_id: title.id,
                season_number: 1,
                name: Some("Season One".to_string()),
                overview: None,
                poster_url: None,
                air_date: None,
                episode_count: Some(2),
                tmdb_id: None,
            })
            .await
            .unwrap();
        assert_eq!(season_again, season_id);
        assert_eq!(store.count_seasons(title.id).await.unwrap(), 1);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn notification_transitions_only_from_pending() {
        let (store, path) = temp_store().await;
        let user = UserId::from_uuid(Uuid::new_v4());

        let id = store
            .create_notification(&NewNotification {
                user_id: user,
                timeline_event_id: None,
                title: "New episode".to_string(),
                body: "S01E02 airs tomorrow".to_string(),
                payload: serde_json::json!({"kind": "episode"}),
                scheduled_for: Utc::now() - ChronoDuration::minutes(1),
            })
            .await
            .unwrap();

        let due = store.pending_notifications(Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);

        assert!(store.mark_notification_sent(id, Utc::now()).await.unwrap());
        assert!(!store.mark_notification_failed(id).await.unwrap());
        assert!(store.mark_notification_read(id, Utc::now()).await.unwrap());

        let loaded = store.get_notification(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::domain::NotificationStatus::Read);
        assert!(loaded.sent_at.is_some());
        assert!(store.pending_notifications(Utc::now(), 10).await.unwrap().is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn future_notifications_are_not_due() {
        let (store, path) = temp_store().await;
        store
            .create_notification(&NewNotification {
                user_id: UserId::from_uuid(Uuid::new_v4()),
                timeline_event_id: None,
                title: "Later".to_string(),
                body: String::new(),
                payload: serde_json::json!({}),
                scheduled_for: Utc::now() + ChronoDuration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.pending_notifications(Utc::now(), 10).await.unwrap().is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn tracked_ids_are_distinct() {
        let (store, path) = temp_store().await;
        let title = store.ensure_title(5, TitleKind::Series).await.unwrap();
        let alice = UserId::from_uuid(Uuid::new_v4());
        let bob = UserId::from_uuid(Uuid::new_v4());

        assert!(store.track_title(alice, title.id).await.unwrap());
        assert!(!store.track_title(alice, title.id).await.unwrap());
        assert!(store.track_title(bob, title.id).await.unwrap());

        assert_eq!(store.tracked_title_ids().await.unwrap(), vec![title.id]);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn cache_pattern_delete_only_hits_matching_keys() {
        let (store, path) = temp_store().await;
        let later = Utc::now() + ChronoDuration::hours(1);

        store.cache_set("season:abc:1", "{}", later).await.unwrap();
        store.cache_set("season:abc:2", "{}", later).await.unwrap();
        store.cache_set("season:xyz:1", "{}", later).await.unwrap();

        assert_eq!(store.cache_delete_matching("season:abc:*").await.unwrap(), 2);
        assert!(store.cache_get("season:xyz:1", Utc::now()).await.unwrap().is_some());

        store
            .cache_set("stale", "{}", Utc::now() - ChronoDuration::seconds(5))
            .await
            .unwrap();
        assert!(store.cache_get("stale", Utc::now()).await.unwrap().is_none());
        assert_eq!(store.purge_expired_cache(Utc::now()).await.unwrap(), 1);

        let _ = std::fs::remove_file(path);
    }
}
