//! HTTP clients for the external metadata and push providers.
//!
//! The syncer and the jobs only see the traits below, never the concrete
//! clients, so each provider can be replaced by a stub in tests.

pub mod fcm;
pub mod omdb;
pub mod thetvdb;
pub mod tmdb;

use crate::models::provider::{
    BackfillEpisode, EnrichmentDetail, ExternalIds, SeasonDetail, TitleDetail,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Primary catalog (TMDB).
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn title_detail(&self, tmdb_id: i32) -> Result<TitleDetail>;

    /// Movie detail. Carries no seasons and reports the IMDb id inline.
    async fn movie_detail(&self, tmdb_id: i32) -> Result<TitleDetail>;

    async fn season_detail(&self, tmdb_id: i32, season_number: i32) -> Result<SeasonDetail>;

    async fn external_ids(&self, tmdb_id: i32) -> Result<ExternalIds>;
}

/// Ratings and credits enrichment (OMDb), addressed by IMDb id.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn enrichment(&self, imdb_id: &str) -> Result<EnrichmentDetail>;
}

/// Secondary episode table used to fill in missing air dates (TheTVDB).
#[async_trait]
pub trait BackfillProvider: Send + Sync {
    async fn episodes(
        &self,
        tvdb_id: i32,
        season_type: &str,
        language: &str,
    ) -> Result<Vec<BackfillEpisode>>;
}

/// Push delivery to a single device token.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Returns the provider's message id on success.
    async fn send_to_device(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: Option<&HashMap<String, String>>,
    ) -> Result<String>;

    /// Sends the same notification to each token in turn, returning one
    /// result per token in input order.
    async fn send_to_multiple(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        data: Option<&HashMap<String, String>>,
    ) -> Vec<(String, Result<String>)> {
        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            let result = self.send_to_device(token, title, body, data).await;
            results.push((token.clone(), result));
        }

        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        debug!(
            success_count = succeeded,
            failure_count = results.len() - succeeded,
            "Sent multicast message"
        );
        results
    }
}

/// No-op push provider used when FCM is not configured. Every send fails, so
/// notifications for users with devices end up `failed` instead of silently
/// `sent`.
pub struct DisabledPush;

#[async_trait]
impl PushProvider for DisabledPush {
    async fn send_to_device(
        &self,
        _device_token: &str,
        _title: &str,
        _body: &str,
        _data: Option<&HashMap<String, String>>,
    ) -> Result<String> {
        anyhow::bail!("Push delivery is not configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_to_multiple_reports_each_token_in_order() {
        let tokens = vec!["a".to_string(), "b".to_string()];
        let results = DisabledPush
            .send_to_multiple(&tokens, "New episode", "Tonight", None)
            .await;

        let order: Vec<&str> = results.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }
}
