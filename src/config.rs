use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub tmdb: TmdbConfig,

    pub omdb: OmdbConfig,

    pub thetvdb: ThetvdbConfig,

    pub fcm: FcmConfig,

    pub scheduler: SchedulerConfig,

    pub cache: CacheConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Emit logs as JSON lines instead of the human format.
    pub log_json: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,

    /// Capacity of the on-demand sync queue.
    pub sync_queue_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/bingebeacon.db".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
            sync_queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: String,

    pub base_url: String,

    pub timeout_seconds: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.themoviedb.org/3".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OmdbConfig {
    /// Enrichment is skipped while this is empty.
    pub api_key: String,

    pub base_url: String,

    pub timeout_seconds: u64,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://www.omdbapi.com/".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThetvdbConfig {
    /// Air-date backfill is skipped while this is empty.
    pub api_key: String,

    pub pin: Option<String>,

    pub base_url: String,

    pub timeout_seconds: u64,

    pub season_type: String,

    pub language: String,
}

impl Default for ThetvdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            pin: None,
            base_url: "https://api4.thetvdb.com/v4".to_string(),
            timeout_seconds: 10,
            season_type: "default".to_string(),
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FcmConfig {
    pub project_id: String,

    /// OAuth bearer token for the FCM HTTP v1 API.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_token: String,

    pub base_url: String,

    pub timeout_seconds: u64,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            server_token: String::new(),
            base_url: "https://fcm.googleapis.com".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl FcmConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.project_id.is_empty() && !self.server_token.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub episode_sync_hours: u32,

    pub dispatch_interval_minutes: u32,

    pub dispatch_batch_size: u64,

    pub cleanup_interval_hours: u32,

    /// Read notifications older than this are deleted by the cleanup job.
    pub read_retention_days: u32,

    /// Deadline for a single job execution.
    pub job_timeout_minutes: u32,

    /// Pause between titles during episode sync.
    pub title_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            episode_sync_hours: 6,
            dispatch_interval_minutes: 1,
            dispatch_batch_size: 500,
            cleanup_interval_hours: 24,
            read_retention_days: 90,
            job_timeout_minutes: 10,
            title_delay_ms: 200,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn episode_sync_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.episode_sync_hours) * 60 * 60)
    }

    #[must_use]
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.dispatch_interval_minutes) * 60)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.cleanup_interval_hours) * 60 * 60)
    }

    #[must_use]
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.job_timeout_minutes) * 60)
    }

    #[must_use]
    pub const fn title_delay(&self) -> Duration {
        Duration::from_millis(self.title_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub metrics_port: Option<u16>,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "bingebeacon".to_string());

        Self {
            metrics_enabled: true,
            metrics_port: None,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Provider secrets given in the environment win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("TMDB_API_KEY") {
            self.tmdb.api_key = v;
        }
        if let Some(v) = get("OMDB_API_KEY") {
            self.omdb.api_key = v;
        }
        if let Some(v) = get("THETVDB_API_KEY") {
            self.thetvdb.api_key = v;
        }
        if let Some(v) = get("THETVDB_PIN") {
            self.thetvdb.pin = Some(v);
        }
        if let Some(v) = get("FCM_PROJECT_ID") {
            self.fcm.project_id = v;
        }
        if let Some(v) = get("FCM_SERVER_TOKEN") {
            self.fcm.server_token = v;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("bingebeacon").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".bingebeacon").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        if s.enabled {
            if s.episode_sync_hours == 0
                || s.dispatch_interval_minutes == 0
                || s.cleanup_interval_hours == 0
            {
                anyhow::bail!("Scheduler intervals must be > 0");
            }

            if s.job_timeout_minutes == 0 {
                anyhow::bail!("Scheduler job timeout must be > 0");
            }

            if self.tmdb.api_key.is_empty() {
                anyhow::bail!("TMDB API key is required when the scheduler is enabled");
            }
        }

        if s.dispatch_batch_size == 0 {
            anyhow::bail!("Dispatch batch size must be > 0");
        }

        if self.general.sync_queue_capacity == 0 {
            anyhow::bail!("Sync queue capacity must be > 0");
        }

        Ok(())
    }
}
