pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod state;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use domain::{TitleId, TitleKind, UserId};
use models::episode::EpisodeRecord;
use services::{SyncQueue, episodes_key, get_or_compute};
use state::AppState;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, info_span};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    init_observability(&config)?;

    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(())
        }
        Some(Commands::Init) => cmd_init(),
        Some(command) => {
            config.validate()?;
            let state = AppState::new(config).await?;
            match command {
                Commands::Daemon => run_daemon(state).await,
                Commands::Sync { title_id } => cmd_sync(&state, title_id).await,
                Commands::Track {
                    user_id,
                    tmdb_id,
                    movie,
                } => cmd_track(&state, user_id, tmdb_id, movie).await,
                Commands::Untrack { user_id, title_id } => {
                    cmd_untrack(&state, user_id, title_id).await
                }
                Commands::Episodes { title_id } => cmd_episodes(&state, title_id).await,
                Commands::RunJob { name } => cmd_run_job(&state, &name).await,
                Commands::Init => cmd_init(),
            }
        }
    }
}

fn init_observability(config: &Config) -> anyhow::Result<()> {
    if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        if let Some(port) = config.observability.metrics_port {
            builder
                .with_http_listener(([0, 0, 0, 0], port))
                .install()
                .context("Failed to install Prometheus exporter")?;
        } else {
            builder
                .install_recorder()
                .context("Failed to install Prometheus recorder")?;
        }
    }

    use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = if config.general.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value.as_str())?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    if let Some(port) = config.observability.metrics_port.filter(|_| config.observability.metrics_enabled) {
        info!("Prometheus metrics exposed on port {}", port);
    }

    Ok(())
}

fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("Created config.toml with default settings.");
    } else {
        println!("config.toml already exists, leaving it untouched.");
    }
    Ok(())
}

async fn cmd_sync(state: &AppState, title_id: TitleId) -> anyhow::Result<()> {
    let report = state.syncer.reconcile(title_id).await?;
    println!("Synced title {title_id}");
    println!(
        "  seasons: {} ok, {} failed",
        report.seasons_synced, report.seasons_failed
    );
    println!(
        "  episodes: {} new, {} updated, {} backfilled",
        report.episodes_created, report.episodes_updated, report.episodes_backfilled
    );
    println!("  timeline events: {}", report.timeline_events_created);
    if report.enrichment_applied {
        println!("  ratings refreshed");
    }
    Ok(())
}

async fn cmd_track(
    state: &AppState,
    user_id: UserId,
    tmdb_id: i32,
    movie: bool,
) -> anyhow::Result<()> {
    let kind = if movie {
        TitleKind::Movie
    } else {
        TitleKind::Series
    };

    let title = state.store.ensure_title(tmdb_id, kind).await?;
    if state.store.track_title(user_id, title.id).await? {
        println!("User {user_id} now follows title {} (tmdb {tmdb_id})", title.id);
    } else {
        println!("User {user_id} already follows title {}", title.id);
    }

    let queue = SyncQueue::start(
        std::sync::Arc::clone(&state.syncer),
        state.config.general.sync_queue_capacity,
        tokio_util::sync::CancellationToken::new(),
        info_span!("sync_queue"),
    );
    queue.submit(title.id)?;
    queue.close().await;

    Ok(())
}

async fn cmd_untrack(state: &AppState, user_id: UserId, title_id: TitleId) -> anyhow::Result<()> {
    if state.store.untrack_title(user_id, title_id).await? {
        println!("User {user_id} no longer follows title {title_id}");
    } else {
        println!("User {user_id} was not following title {title_id}");
    }
    Ok(())
}

async fn cmd_episodes(state: &AppState, title_id: TitleId) -> anyhow::Result<()> {
    let ttl = Duration::from_secs(state.config.cache.default_ttl_seconds);
    let store = state.store.clone();
    let episodes: Vec<EpisodeRecord> = get_or_compute(
        state.cache.as_ref(),
        &episodes_key(title_id),
        ttl,
        move || async move { store.list_episodes(title_id).await },
    )
    .await?;

    if episodes.is_empty() {
        println!("No episodes stored for title {title_id}");
        return Ok(());
    }

    for episode in &episodes {
        let air_date = episode
            .air_date
            .map_or_else(|| "TBA".to_string(), models::format_date);
        println!(
            "S{:02}E{:02}  {:<10}  {}",
            episode.season_number,
            episode.episode_number,
            air_date,
            episode.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn cmd_run_job(state: &AppState, name: &str) -> anyhow::Result<()> {
    let scheduler = state.build_scheduler();
    scheduler.run_now(name).await?;
    println!("Job {name} finished");
    Ok(())
}

async fn run_daemon(state: AppState) -> anyhow::Result<()> {
    info!(
        "bingebeacon v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    state.store.ping().await?;

    let scheduler = state.build_scheduler();
    let shutdown = scheduler.shutdown_token();

    let queue = SyncQueue::start(
        std::sync::Arc::clone(&state.syncer),
        state.config.general.sync_queue_capacity,
        shutdown.clone(),
        info_span!("sync_queue"),
    );

    // Titles that never synced get picked up right away instead of waiting
    // for the first episode sync tick.
    let handle = queue.handle();
    for title_id in state.store.tracked_title_ids().await? {
        match state.store.get_title(title_id).await? {
            Some(title) if title.last_synced_at.is_none() => {
                if let Err(e) = handle.submit(title_id) {
                    error!(%title_id, error = %e, "Failed to queue initial sync");
                }
            }
            _ => {}
        }
    }
    drop(handle);

    if state.config.scheduler.enabled {
        scheduler.start().await;
    } else {
        info!("Scheduler is disabled in config");
    }

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    // Cancels the shared token first, so queued initial syncs are dropped.
    // Those titles are still unsynced and get queued again on next start.
    scheduler.stop().await;
    queue.close().await;
    info!("Daemon stopped");

    Ok(())
}
