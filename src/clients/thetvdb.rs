use crate::clients::BackfillProvider;
use crate::config::ThetvdbConfig;
use crate::models::parse_date;
use crate::models::provider::BackfillEpisode;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifetime assumed for a login token.
const TOKEN_LIFETIME_DAYS: i64 = 25;
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Unauthenticated,
    Authenticated {
        token: String,
        expires_at: DateTime<Utc>,
    },
}

impl TokenState {
    #[must_use]
    pub fn issued(token: String, now: DateTime<Utc>) -> Self {
        Self::Authenticated {
            token,
            expires_at: now + ChronoDuration::days(TOKEN_LIFETIME_DAYS),
        }
    }

    /// The current token, unless it is missing or inside the refresh margin.
    #[must_use]
    pub fn usable_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match self {
            Self::Unauthenticated => None,
            Self::Authenticated { token, expires_at } => {
                if now + ChronoDuration::minutes(REFRESH_MARGIN_MINUTES) < *expires_at {
                    Some(token.as_str())
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    apikey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pin: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    data: EpisodesData,
}

#[derive(Debug, Deserialize)]
struct EpisodesData {
    #[serde(default)]
    episodes: Vec<TvdbEpisode>,
}

#[derive(Debug, Deserialize)]
struct TvdbEpisode {
    #[serde(rename = "seasonNumber")]
    season_number: i32,
    number: i32,
    aired: Option<String>,
}

pub struct ThetvdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    pin: Option<String>,
    state: Mutex<TokenState>,
}

impl ThetvdbClient {
    pub fn new(config: &ThetvdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .context("Failed to build TheTVDB HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            pin: config.pin.clone().filter(|p| !p.is_empty()),
            state: Mutex::new(TokenState::Unauthenticated),
        })
    }

    async fn login(&self) -> Result<String> {
        let url = format!("{}/login", self.base_url);
        let request = LoginRequest {
            apikey: &self.api_key,
            pin: self.pin.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to TheTVDB")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("TheTVDB login failed: status {status}");
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .context("Failed to decode TheTVDB login response")?;
        debug!("Authenticated with TheTVDB");
        Ok(parsed.data.token)
    }

    /// Returns a valid bearer token, logging in if needed. Concurrent callers
    /// wait on the same lock, so only one login is in flight.
    async fn ensure_authenticated(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.usable_token(Utc::now()) {
            return Ok(token.to_string());
        }

        debug!(reason = "token_missing_or_expiring", "Logging in to TheTVDB...");
        let token = self.login().await?;
        *state = TokenState::issued(token.clone(), Utc::now());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.state.lock().await = TokenState::Unauthenticated;
    }

    async fn fetch_episodes(&self, url: &str, token: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("TheTVDB request failed")
    }
}

#[async_trait]
impl BackfillProvider for ThetvdbClient {
    async fn episodes(
        &self,
        tvdb_id: i32,
        season_type: &str,
        language: &str,
    ) -> Result<Vec<BackfillEpisode>> {
        let url = format!(
            "{}/series/{tvdb_id}/episodes/{season_type}/{language}",
            self.base_url
        );

        let token = self.ensure_authenticated().await?;
        let mut response = self.fetch_episodes(&url, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(reason = "token_rejected", "Re-authenticating with TheTVDB");
            self.invalidate_token().await;
            let token = self.ensure_authenticated().await?;
            response = self.fetch_episodes(&url, &token).await?;
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("TheTVDB API error: {status} - {body}"));
        }

        let parsed: EpisodesResponse = response
            .json()
            .await
            .context("Failed to decode TheTVDB episodes")?;

        Ok(parsed
            .data
            .episodes
            .into_iter()
            .map(|e| BackfillEpisode {
                season_number: e.season_number,
                episode_number: e.number,
                aired: e.aired.as_deref().and_then(parse_date),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_has_no_token() {
        assert_eq!(TokenState::Unauthenticated.usable_token(Utc::now()), None);
    }

    #[test]
    fn fresh_token_is_usable() {
        let now = Utc::now();
        let state = TokenState::issued("abc".to_string(), now);
        assert_eq!(state.usable_token(now), Some("abc"));
        assert_eq!(
            state.usable_token(now + ChronoDuration::days(24)),
            Some("abc")
        );
    }

    #[test]
    fn token_inside_refresh_margin_is_refreshed() {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::minutes(4);
        let state = TokenState::Authenticated {
            token: "abc".to_string(),
            expires_at,
        };
        assert_eq!(state.usable_token(now), None);

        let later = TokenState::Authenticated {
            token: "abc".to_string(),
            expires_at: now + ChronoDuration::minutes(6),
        };
        assert_eq!(later.usable_token(now), Some("abc"));
    }

    #[test]
    fn login_request_omits_empty_pin() {
        let body = serde_json::to_value(LoginRequest {
            apikey: "k",
            pin: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"apikey": "k"}));
    }

    #[test]
    fn episodes_payload_maps_aired_dates() {
        let raw = r#"{"status":"success","data":{"episodes":[
            {"seasonNumber": 1, "number": 3, "aired": "2025-02-01"},
            {"seasonNumber": 1, "number": 4, "aired": null}
        ]}}"#;
        let parsed: EpisodesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.episodes.len(), 2);
        assert_eq!(
            parse_date(parsed.data.episodes[0].aired.as_deref().unwrap()),
            chrono::NaiveDate::from_ymd_opt(2025, 2, 1)
        );
        assert!(parsed.data.episodes[1].aired.is_none());
    }
}
