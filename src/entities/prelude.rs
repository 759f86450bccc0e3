pub use super::episodes::Entity as Episodes;
pub use super::notifications::Entity as Notifications;
pub use super::seasons::Entity as Seasons;
pub use super::timeline_events::Entity as TimelineEvents;
pub use super::titles::Entity as Titles;
pub use super::tracked_titles::Entity as TrackedTitles;
pub use super::user_devices::Entity as UserDevices;
pub use super::view_cache::Entity as ViewCache;
