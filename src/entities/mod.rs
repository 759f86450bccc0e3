pub mod prelude;

pub mod episodes;
pub mod notifications;
pub mod seasons;
pub mod timeline_events;
pub mod titles;
pub mod tracked_titles;
pub mod user_devices;
pub mod view_cache;
