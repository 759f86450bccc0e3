//! Derived read-view cache and title-scoped invalidation.

use crate::db::Store;
use crate::domain::TitleId;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, debug, warn};

#[must_use]
pub fn show_key(title_id: TitleId) -> String {
    format!("show:{title_id}")
}

#[must_use]
pub fn season_pattern(title_id: TitleId) -> String {
    format!("season:{title_id}:*")
}

/// Key of the full episode listing of a title. Covered by `episodes_pattern`.
#[must_use]
pub fn episodes_key(title_id: TitleId) -> String {
    format!("episodes:{title_id}:all")
}

#[must_use]
pub fn episodes_pattern(title_id: TitleId) -> String {
    format!("episodes:{title_id}:*")
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes every key matching a glob where `*` matches any run of
    /// characters. Returns the number of entries removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;
}

/// Cache entries kept in the `view_cache` table.
#[derive(Clone)]
pub struct StoreCache {
    store: Store,
}

impl StoreCache {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheBackend for StoreCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.cache_get(key, Utc::now()).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)?;
        self.store.cache_set(key, value, Utc::now() + ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.cache_delete(key).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        self.store.cache_delete_matching(pattern).await
    }
}

/// Returns the cached value for `key`, or computes, stores and returns it.
///
/// Cache read and write failures degrade to computing the value; only an
/// error from `compute` itself is returned.
pub async fn get_or_compute<T, F, Fut>(
    cache: &dyn CacheBackend,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                return Ok(value);
            }
            Err(e) => warn!(key, error = %e, "Discarding undecodable cache entry"),
        },
        Ok(None) => {}
        Err(e) => warn!(key, error = %e, "Cache read failed"),
    }

    let value = compute().await?;

    match serde_json::to_string(&value) {
        Ok(raw) => {
            if let Err(e) = cache.set(key, &raw, ttl).await {
                warn!(key, error = %e, "Cache write failed");
            }
        }
        Err(e) => warn!(key, error = %e, "Failed to encode cache value"),
    }

    Ok(value)
}

/// Drops every derived view of a title after its data changed.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn CacheBackend>,
    span: Span,
}

impl CacheInvalidator {
    #[must_use]
    pub fn new(cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            cache,
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Attempts every deletion even when an earlier one fails, then reports
    /// the first failure.
    pub async fn invalidate_title(&self, title_id: TitleId) -> Result<()> {
        async {
            let mut first_error = None;

            if let Err(e) = self.cache.delete(&show_key(title_id)).await {
                first_error.get_or_insert(e);
            }

            for pattern in [season_pattern(title_id), episodes_pattern(title_id)] {
                match self.cache.delete_pattern(&pattern).await {
                    Ok(removed) => debug!(pattern = %pattern, removed, "Invalidated cache entries"),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }

            first_error.map_or(Ok(()), Err)
        }
        .instrument(self.span.clone())
        .await
    }
}
