pub mod cache;
pub mod sync_queue;
pub mod syncer;

pub use cache::{CacheBackend, CacheInvalidator, StoreCache, episodes_key, get_or_compute};
pub use sync_queue::{SubmitError, SyncHandle, SyncQueue};
pub use syncer::{SyncError, SyncReport, Syncer};
