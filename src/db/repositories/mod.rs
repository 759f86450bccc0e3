pub mod cache;
pub mod episode;
pub mod notification;
pub mod timeline;
pub mod title;
pub mod tracking;
