pub mod episode_sync;
pub mod notification_dispatch;
pub mod stale_cleanup;

pub use episode_sync::EpisodeSyncJob;
pub use notification_dispatch::NotificationDispatchJob;
pub use stale_cleanup::StaleCleanupJob;
