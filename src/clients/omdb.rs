use crate::clients::EnrichmentProvider;
use crate::config::OmdbConfig;
use crate::models::provider::{EnrichmentDetail, NamedRating};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    error: Option<String>,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: String,
    #[serde(rename = "imdbVotes", default)]
    imdb_votes: String,
    #[serde(default)]
    metascore: String,
    #[serde(default)]
    rated: String,
    #[serde(default)]
    awards: String,
    #[serde(default)]
    director: String,
    #[serde(default)]
    actors: String,
    #[serde(default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbRating {
    source: String,
    value: String,
}

impl OmdbResponse {
    fn into_detail(self) -> Result<EnrichmentDetail> {
        if self.response.eq_ignore_ascii_case("false") {
            bail!(
                "OMDb error: {}",
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        Ok(EnrichmentDetail {
            imdb_rating: self.imdb_rating,
            imdb_votes: self.imdb_votes,
            metascore: self.metascore,
            rated: self.rated,
            awards: self.awards,
            director: self.director,
            actors: self.actors,
            ratings: self
                .ratings
                .into_iter()
                .map(|r| NamedRating {
                    source: r.source,
                    value: r.value,
                })
                .collect(),
        })
    }
}

#[derive(Clone)]
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(config: &OmdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .context("Failed to build OMDb HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl EnrichmentProvider for OmdbClient {
    async fn enrichment(&self, imdb_id: &str) -> Result<EnrichmentDetail> {
        let mut url = Url::parse(&self.base_url).context("Invalid OMDb base url")?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("i", imdb_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("OMDb request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OMDb API error: {status} - {body}"));
        }

        let parsed: OmdbResponse = response
            .json()
            .await
            .context("Failed to decode OMDb response")?;
        parsed.into_detail()
    }
}
