//! Integration tests for title reconciliation.

mod common;

use bingebeacon::domain::{TitleId, TitleKind};
use bingebeacon::entities::titles;
use bingebeacon::models::provider::{BackfillEpisode, EnrichmentDetail, ExternalIds, NamedRating};
use bingebeacon::models::title::RatingsSnapshot;
use bingebeacon::services::{StoreCache, SyncError, episodes_key, get_or_compute};
use chrono::{Duration, Utc};
use common::{StubBackfill, StubCatalog, StubEnrichment, episode, season, syncer, test_db, title_detail};
use sea_orm::{ActiveModelTrait, Set};
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_end_to_end_single_season() {
    let db = test_db("sync-e2e").await;
    let today = Utc::now().date_naive();
    let past = today - Duration::days(10);
    let future = today + Duration::days(10);

    let title = db.store.ensure_title(100, TitleKind::Series).await.unwrap();
    let catalog = Arc::new(StubCatalog::new(title_detail(100, "Show", &[1])));
    catalog.set_season(season(1, vec![episode(1, Some(past)), episode(2, Some(future))]));
    let syncer = syncer(&db.store, Arc::clone(&catalog));

    let report = syncer.reconcile(title.id).await.unwrap();
    assert_eq!(report.seasons_synced, 1);
    assert_eq!(report.episodes_created, 2);
    assert_eq!(report.timeline_events_created, 1);

    let events = db.store.list_timeline_events(title.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Show - S01E02");
    assert_eq!(events[0].event_type, "new_episode");
    assert_eq!(events[0].event_date, future.format("%Y-%m-%d").to_string());
    assert_eq!(events[0].description.as_deref(), Some("Overview 2"));

    let stored = db.store.get_title(title.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Show");
    assert_eq!(stored.network.as_deref(), Some("HBO"));
    assert!(stored.last_synced_at.is_some());
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let db = test_db("sync-idempotent").await;
    let future = Utc::now().date_naive() + Duration::days(3);

    let title = db.store.ensure_title(200, TitleKind::Series).await.unwrap();
    let catalog = Arc::new(StubCatalog::new(title_detail(200, "Again", &[1])));
    catalog.set_season(season(1, vec![episode(1, Some(future)), episode(2, Some(future))]));
    let syncer = syncer(&db.store, Arc::clone(&catalog));

    let first = syncer.reconcile(title.id).await.unwrap();
    let second = syncer.reconcile(title.id).await.unwrap();

    assert_eq!(first.episodes_created, 2);
    assert_eq!(second.episodes_created, 0);
    assert_eq!(second.episodes_updated, 2);
    assert_eq!(second.timeline_events_created, 0);

    assert_eq!(db.store.list_episodes(title.id).await.unwrap().len(), 2);
    assert_eq!(db.store.count_seasons(title.id).await.unwrap(), 1);
    assert_eq!(db.store.list_timeline_events(title.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_today_and_past_episodes_emit_nothing() {
    let db = test_db("sync-today").await;
    let today = Utc::now().date_naive();

    let title = db.store.ensure_title(201, TitleKind::Series).await.unwrap();
    let catalog = Arc::new(StubCatalog::new(title_detail(201, "Now", &[1])));
    catalog.set_season(season(
        1,
        vec![episode(1, Some(today)), episode(2, Some(today - Duration::days(1)))],
    ));

    let report = syncer(&db.store, catalog).reconcile(title.id).await.unwrap();
    assert_eq!(report.episodes_created, 2);
    assert_eq!(report.timeline_events_created, 0);
}

#[tokio::test]
async fn test_failed_season_does_not_stop_the_rest() {
    let db = test_db("sync-partial").await;
    let title = db.store.ensure_title(300, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(300, "Partial", &[1, 2, 3])));
    catalog.set_season(season(1, vec![episode(1, None), episode(2, None)]));
    catalog.set_season(season(3, vec![episode(1, None)]));

    let report = syncer(&db.store, catalog).reconcile(title.id).await.unwrap();
    assert_eq!(report.seasons_failed, 1);
    assert_eq!(report.seasons_synced, 2);
    assert_eq!(db.store.count_seasons(title.id).await.unwrap(), 2);

    let episodes = db.store.list_episodes(title.id).await.unwrap();
    assert_eq!(episodes.len(), 3);
    assert!(episodes.iter().any(|e| e.season_number == 1));
    assert!(episodes.iter().any(|e| e.season_number == 3));
    assert!(episodes.iter().all(|e| e.season_number != 2));
}

#[tokio::test]
async fn test_movie_uses_movie_detail_and_stores_no_episodes() {
    let db = test_db("sync-movie").await;
    let title = db.store.ensure_title(603, TitleKind::Movie).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(603, "Some TV Show", &[1])));
    catalog.set_season(season(1, vec![episode(1, None)]));
    catalog.set_external_ids(Some(ExternalIds {
        imdb_id: Some("tt9999999".to_string()),
        tvdb_id: Some(42),
    }));
    catalog.set_movie(Some(bingebeacon::models::provider::TitleDetail {
        id: 603,
        name: "The Matrix".to_string(),
        imdb_id: Some("tt0133093".to_string()),
        ..Default::default()
    }));

    let report = syncer(&db.store, Arc::clone(&catalog))
        .reconcile(title.id)
        .await
        .unwrap();
    assert_eq!(report.seasons_synced, 0);
    assert_eq!(report.episodes_created, 0);
    assert_eq!(catalog.calls(), 0);

    let stored = db.store.get_title(title.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "The Matrix");
    assert_eq!(stored.kind, TitleKind::Movie);
    assert_eq!(stored.imdb_id.as_deref(), Some("tt0133093"));
    assert_eq!(stored.tvdb_id, None);
    assert!(stored.last_synced_at.is_some());
    assert_eq!(db.store.count_seasons(title.id).await.unwrap(), 0);
    assert!(db.store.list_episodes(title.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_movie_without_movie_detail_is_left_untouched() {
    let db = test_db("sync-movie-fail").await;
    let title = db.store.ensure_title(604, TitleKind::Movie).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(604, "Some TV Show", &[1])));
    catalog.set_season(season(1, vec![episode(1, None)]));

    let err = syncer(&db.store, catalog).reconcile(title.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Provider(_)));

    let stored = db.store.get_title(title.id).await.unwrap().unwrap();
    assert_eq!(stored.name, title.name);
    assert!(stored.last_synced_at.is_none());
    assert!(db.store.list_episodes(title.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_primary_failure_aborts_without_writes() {
    let db = test_db("sync-primary-fail").await;
    let title = db.store.ensure_title(400, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::default());
    let err = syncer(&db.store, catalog).reconcile(title.id).await.unwrap_err();
    assert!(matches!(err, SyncError::Provider(_)));

    let stored = db.store.get_title(title.id).await.unwrap().unwrap();
    assert!(stored.last_synced_at.is_none());
    assert_eq!(stored.name, title.name);
}

#[tokio::test]
async fn test_unknown_title_and_missing_primary_id_are_permanent() {
    let db = test_db("sync-missing").await;
    let catalog = Arc::new(StubCatalog::new(title_detail(1, "Unused", &[])));
    let syncer = syncer(&db.store, Arc::clone(&catalog));

    let err = syncer.reconcile(TitleId::new()).await.unwrap_err();
    assert!(matches!(err, SyncError::TitleNotFound(_)));
    assert!(err.is_permanent());

    let id = uuid::Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    titles::ActiveModel {
        id: Set(id),
        kind: Set("series".to_string()),
        name: Set("Orphan".to_string()),
        overview: Set(None),
        poster_url: Set(None),
        backdrop_url: Set(None),
        status: Set(None),
        genres: Set(None),
        network: Set(None),
        premiere_date: Set(None),
        tmdb_id: Set(None),
        imdb_id: Set(None),
        tvdb_id: Set(None),
        last_synced_at: Set(None),
        sync_priority: Set(0),
        ratings: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(&db.store.conn)
    .await
    .unwrap();

    let err = syncer.reconcile(TitleId::from(id)).await.unwrap_err();
    assert!(matches!(err, SyncError::MissingPrimaryId(_)));
    assert_eq!(catalog.calls(), 0);
}

#[tokio::test]
async fn test_external_ids_survive_failed_lookup() {
    let db = test_db("sync-external").await;
    let title = db.store.ensure_title(500, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(500, "Ids", &[])));
    catalog.set_external_ids(Some(ExternalIds {
        imdb_id: Some("tt0903747".to_string()),
        tvdb_id: Some(81_189),
    }));
    let syncer = syncer(&db.store, Arc::clone(&catalog));
    syncer.reconcile(title.id).await.unwrap();

    catalog.set_external_ids(None);
    syncer.reconcile(title.id).await.unwrap();

    catalog.set_external_ids(Some(ExternalIds {
        imdb_id: Some(String::new()),
        tvdb_id: None,
    }));
    syncer.reconcile(title.id).await.unwrap();

    let stored = db.store.get_title(title.id).await.unwrap().unwrap();
    assert_eq!(stored.imdb_id.as_deref(), Some("tt0903747"));
    assert_eq!(stored.tvdb_id, Some(81_189));
}

#[tokio::test]
async fn test_enrichment_stores_ratings_snapshot() {
    let db = test_db("sync-enrich").await;
    let title = db.store.ensure_title(600, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(600, "Rated", &[])));
    catalog.set_external_ids(Some(ExternalIds {
        imdb_id: Some("tt1".to_string()),
        tvdb_id: None,
    }));

    let enrichment = Arc::new(StubEnrichment {
        detail: Some(EnrichmentDetail {
            imdb_rating: "8.1".to_string(),
            rated: "TV-14".to_string(),
            ratings: vec![NamedRating {
                source: "Rotten Tomatoes".to_string(),
                value: "91%".to_string(),
            }],
            ..Default::default()
        }),
        requested: Mutex::new(Vec::new()),
    });

    let report = syncer(&db.store, catalog)
        .with_enrichment(enrichment.clone())
        .reconcile(title.id)
        .await
        .unwrap();
    assert!(report.enrichment_applied);
    assert_eq!(*enrichment.requested.lock().unwrap(), vec!["tt1".to_string()]);

    let stored = db.store.get_title(title.id).await.unwrap().unwrap();
    let snapshot: RatingsSnapshot = serde_json::from_str(stored.ratings.as_deref().unwrap()).unwrap();
    assert_eq!(snapshot.imdb_rating, "8.1");
    assert_eq!(snapshot.rotten_tomatoes, "91%");
    assert_eq!(snapshot.source, "omdb");
}

#[tokio::test]
async fn test_failed_enrichment_keeps_previous_ratings() {
    let db = test_db("sync-enrich-fail").await;
    let title = db.store.ensure_title(601, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(601, "Rated", &[])));
    catalog.set_external_ids(Some(ExternalIds {
        imdb_id: Some("tt2".to_string()),
        tvdb_id: None,
    }));

    let good = Arc::new(StubEnrichment {
        detail: Some(EnrichmentDetail {
            imdb_rating: "7.0".to_string(),
            ..Default::default()
        }),
        requested: Mutex::new(Vec::new()),
    });
    syncer(&db.store, Arc::clone(&catalog))
        .with_enrichment(good)
        .reconcile(title.id)
        .await
        .unwrap();
    let before = db.store.get_title(title.id).await.unwrap().unwrap().ratings;

    let failing = Arc::new(StubEnrichment {
        detail: None,
        requested: Mutex::new(Vec::new()),
    });
    let report = syncer(&db.store, catalog)
        .with_enrichment(failing)
        .reconcile(title.id)
        .await
        .unwrap();
    assert!(!report.enrichment_applied);

    let after = db.store.get_title(title.id).await.unwrap().unwrap().ratings;
    assert!(before.is_some());
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_backfill_resolves_missing_air_dates() {
    let db = test_db("sync-backfill").await;
    let future = Utc::now().date_naive() + Duration::days(20);
    let title = db.store.ensure_title(700, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(700, "Later", &[1])));
    catalog.set_external_ids(Some(ExternalIds {
        imdb_id: None,
        tvdb_id: Some(9),
    }));
    catalog.set_season(season(1, vec![episode(1, None), episode(2, None)]));

    let backfill = Arc::new(StubBackfill {
        episodes: vec![
            BackfillEpisode {
                season_number: 1,
                episode_number: 1,
                aired: Some(future),
            },
            BackfillEpisode {
                season_number: 2,
                episode_number: 2,
                aired: Some(future),
            },
        ],
        calls: AtomicUsize::new(0),
    });

    let report = syncer(&db.store, catalog)
        .with_backfill(backfill, "default", "eng")
        .reconcile(title.id)
        .await
        .unwrap();
    assert_eq!(report.episodes_backfilled, 1);
    assert_eq!(report.timeline_events_created, 1);

    let first = db.store.get_episode(title.id, 1, 1).await.unwrap().unwrap();
    let second = db.store.get_episode(title.id, 1, 2).await.unwrap().unwrap();
    assert_eq!(first.air_date, Some(future));
    assert_eq!(second.air_date, None);

    let events = db.store.list_timeline_events(title.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Later - S01E01");
}

#[tokio::test]
async fn test_no_backfill_without_tvdb_id() {
    let db = test_db("sync-no-tvdb").await;
    let title = db.store.ensure_title(701, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(701, "Dateless", &[1])));
    catalog.set_season(season(1, vec![episode(1, None)]));

    let backfill = Arc::new(StubBackfill {
        episodes: vec![],
        calls: AtomicUsize::new(0),
    });

    let report = syncer(&db.store, catalog)
        .with_backfill(backfill.clone(), "default", "eng")
        .reconcile(title.id)
        .await
        .unwrap();
    assert_eq!(report.episodes_backfilled, 0);
    assert_eq!(backfill.calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    let stored = db.store.get_episode(title.id, 1, 1).await.unwrap().unwrap();
    assert_eq!(stored.air_date, None);
}

#[tokio::test]
async fn test_known_air_date_is_not_cleared() {
    let db = test_db("sync-keep-date").await;
    let date = Utc::now().date_naive() - Duration::days(30);
    let title = db.store.ensure_title(800, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(800, "Kept", &[1])));
    catalog.set_season(season(1, vec![episode(1, Some(date))]));
    let syncer = syncer(&db.store, Arc::clone(&catalog));
    syncer.reconcile(title.id).await.unwrap();

    catalog.set_season(season(1, vec![episode(1, None)]));
    syncer.reconcile(title.id).await.unwrap();

    let stored = db.store.get_episode(title.id, 1, 1).await.unwrap().unwrap();
    assert_eq!(stored.air_date, Some(date));
}

#[tokio::test]
async fn test_concurrent_reconciles_of_same_title_do_not_duplicate() {
    let db = test_db("sync-concurrent").await;
    let future = Utc::now().date_naive() + Duration::days(5);
    let title = db.store.ensure_title(900, TitleKind::Series).await.unwrap();

    let catalog = Arc::new(StubCatalog::new(title_detail(900, "Race", &[1])));
    catalog.set_season(season(1, vec![episode(1, Some(future))]));
    let syncer = Arc::new(syncer(&db.store, catalog));

    let a = {
        let syncer = Arc::clone(&syncer);
        tokio::spawn(async move { syncer.reconcile(title.id).await })
    };
    let b = {
        let syncer = Arc::clone(&syncer);
        tokio::spawn(async move { syncer.reconcile(title.id).await })
    };

    let ra = a.await.unwrap().unwrap();
    let rb = b.await.unwrap().unwrap();
    assert_eq!(ra.episodes_created + rb.episodes_created, 1);
    assert_eq!(ra.timeline_events_created + rb.timeline_events_created, 1);
    assert_eq!(db.store.list_timeline_events(title.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconcile_drops_cached_episode_listing() {
    let db = test_db("sync-cache").await;
    let title = db.store.ensure_title(1000, TitleKind::Series).await.unwrap();
    let cache = StoreCache::new(db.store.clone());
    let key = episodes_key(title.id);
    let ttl = std::time::Duration::from_secs(600);

    let store = db.store.clone();
    let before = get_or_compute(&cache, &key, ttl, move || async move {
        store.list_episodes(title.id).await
    })
    .await
    .unwrap();
    assert!(before.is_empty());
    assert!(db.store.cache_get(&key, Utc::now()).await.unwrap().is_some());

    let catalog = Arc::new(StubCatalog::new(title_detail(1000, "Fresh", &[1])));
    catalog.set_season(season(1, vec![episode(1, None)]));
    syncer(&db.store, catalog).reconcile(title.id).await.unwrap();

    assert!(db.store.cache_get(&key, Utc::now()).await.unwrap().is_none());
    let store = db.store.clone();
    let after = get_or_compute(&cache, &key, ttl, move || async move {
        store.list_episodes(title.id).await
    })
    .await
    .unwrap();
    assert_eq!(after.len(), 1);
}
