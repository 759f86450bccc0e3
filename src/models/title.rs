use crate::domain::{TitleId, TitleKind};
use crate::models::provider::EnrichmentDetail;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const ROTTEN_TOMATOES_SOURCE: &str = "Rotten Tomatoes";

#[derive(Debug, Clone)]
pub struct Title {
    pub id: TitleId,
    pub kind: TitleKind,
    pub name: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub network: Option<String>,
    pub premiere_date: Option<NaiveDate>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i32>,
    pub last_synced_at: Option<String>,
    pub sync_priority: i32,
    pub ratings: Option<String>,
}

impl Title {
    /// IMDb id usable for enrichment lookups, ignoring blank values.
    #[must_use]
    pub fn enrichment_key(&self) -> Option<&str> {
        self.imdb_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Fields written back to a title after a successful primary fetch.
///
/// `None` for an identifier or the ratings blob keeps the stored value.
#[derive(Debug, Clone)]
pub struct TitleSync {
    pub name: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub network: Option<String>,
    pub premiere_date: Option<NaiveDate>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i32>,
    pub ratings: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// Compact ratings record stored on the title as an opaque JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingsSnapshot {
    pub imdb_rating: String,
    pub imdb_votes: String,
    pub metascore: String,
    pub rated: String,
    pub awards: String,
    pub director: String,
    pub actors: String,
    pub source: String,
    pub enriched_at: String,
    pub rotten_tomatoes: String,
}

impl RatingsSnapshot {
    #[must_use]
    pub fn from_enrichment(detail: &EnrichmentDetail, enriched_at: DateTime<Utc>) -> Self {
        let rotten_tomatoes = detail
            .ratings
            .iter()
            .find(|r| r.source == ROTTEN_TOMATOES_SOURCE)
            .map(|r| r.value.clone())
            .unwrap_or_default();

        Self {
            imdb_rating: detail.imdb_rating.clone(),
            imdb_votes: detail.imdb_votes.clone(),
            metascore: detail.metascore.clone(),
            rated: detail.rated.clone(),
            awards: detail.awards.clone(),
            director: detail.director.clone(),
            actors: detail.actors.clone(),
            source: "omdb".to_string(),
            enriched_at: enriched_at.to_rfc3339(),
            rotten_tomatoes,
        }
    }
}
