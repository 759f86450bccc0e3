use crate::clients::CatalogProvider;
use crate::config::TmdbConfig;
use crate::models::parse_date;
use crate::models::provider::{
    EpisodeDetail, ExternalIds, SeasonDetail, SeasonSummary, TitleDetail,
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct TvDetail {
    id: i32,
    #[serde(default)]
    name: String,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    status: Option<String>,
    first_air_date: Option<String>,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    networks: Vec<Named>,
    #[serde(default)]
    seasons: Vec<TvSeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    id: i32,
    #[serde(default)]
    title: String,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    status: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    genres: Vec<Named>,
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TvSeasonSummary {
    season_number: i32,
    name: Option<String>,
    episode_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TvSeason {
    id: i32,
    season_number: i32,
    name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    air_date: Option<String>,
    #[serde(default)]
    episodes: Vec<TvEpisode>,
}

#[derive(Debug, Deserialize)]
struct TvEpisode {
    id: i32,
    episode_number: i32,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
    runtime: Option<i32>,
    still_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<i32>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn date(value: Option<&str>) -> Option<chrono::NaiveDate> {
    value.and_then(parse_date)
}

impl From<TvDetail> for TitleDetail {
    fn from(tv: TvDetail) -> Self {
        Self {
            id: tv.id,
            name: tv.name,
            overview: non_empty(tv.overview),
            poster_path: non_empty(tv.poster_path),
            backdrop_path: non_empty(tv.backdrop_path),
            status: non_empty(tv.status),
            first_air_date: date(tv.first_air_date.as_deref()),
            genres: tv.genres.into_iter().map(|g| g.name).collect(),
            networks: tv.networks.into_iter().map(|n| n.name).collect(),
            seasons: tv
                .seasons
                .into_iter()
                .map(|s| SeasonSummary {
                    season_number: s.season_number,
                    name: s.name,
                    episode_count: s.episode_count,
                })
                .collect(),
            imdb_id: None,
        }
    }
}

impl From<MovieDetail> for TitleDetail {
    fn from(movie: MovieDetail) -> Self {
        Self {
            id: movie.id,
            name: movie.title,
            overview: non_empty(movie.overview),
            poster_path: non_empty(movie.poster_path),
            backdrop_path: non_empty(movie.backdrop_path),
            status: non_empty(movie.status),
            first_air_date: date(movie.release_date.as_deref()),
            genres: movie.genres.into_iter().map(|g| g.name).collect(),
            networks: Vec::new(),
            seasons: Vec::new(),
            imdb_id: non_empty(movie.imdb_id),
        }
    }
}

impl From<TvSeason> for SeasonDetail {
    fn from(season: TvSeason) -> Self {
        Self {
            id: season.id,
            season_number: season.season_number,
            name: non_empty(season.name),
            overview: non_empty(season.overview),
            poster_path: non_empty(season.poster_path),
            air_date: date(season.air_date.as_deref()),
            episodes: season
                .episodes
                .into_iter()
                .map(|e| EpisodeDetail {
                    id: e.id,
                    episode_number: e.episode_number,
                    name: non_empty(e.name),
                    overview: non_empty(e.overview),
                    air_date: date(e.air_date.as_deref()),
                    runtime_minutes: e.runtime,
                    still_path: non_empty(e.still_path),
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .context("Failed to build TMDB HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .with_context(|| format!("Invalid TMDB url for {path}"))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("TMDB request failed: {path}"))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            bail!("TMDB rate limited on {path}");
        }
        if status == StatusCode::NOT_FOUND {
            bail!("TMDB resource not found: {path}");
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("TMDB API error: {status} - {body}"));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode TMDB response for {path}"))
    }
}

#[async_trait]
impl CatalogProvider for TmdbClient {
    async fn title_detail(&self, tmdb_id: i32) -> Result<TitleDetail> {
        let tv: TvDetail = self.get_json(&format!("/tv/{tmdb_id}")).await?;
        Ok(tv.into())
    }

    async fn movie_detail(&self, tmdb_id: i32) -> Result<TitleDetail> {
        let movie: MovieDetail = self.get_json(&format!("/movie/{tmdb_id}")).await?;
        Ok(movie.into())
    }

    async fn season_detail(&self, tmdb_id: i32, season_number: i32) -> Result<SeasonDetail> {
        let season: TvSeason = self
            .get_json(&format!("/tv/{tmdb_id}/season/{season_number}"))
            .await?;
        Ok(season.into())
    }

    async fn external_ids(&self, tmdb_id: i32) -> Result<ExternalIds> {
        let ids: TvExternalIds = self
            .get_json(&format!("/tv/{tmdb_id}/external_ids"))
            .await?;
        Ok(ExternalIds {
            imdb_id: non_empty(ids.imdb_id),
            tvdb_id: ids.tvdb_id.filter(|id| *id > 0),
        })
    }
}
