//! Provider-neutral shapes returned by the metadata and push clients.
//!
//! Each client maps its own wire format into these types so the syncer never
//! depends on a specific provider's JSON.

use chrono::NaiveDate;

#[derive(Debug, Clone, Default)]
pub struct TitleDetail {
    pub id: i32,
    pub name: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub status: Option<String>,
    pub first_air_date: Option<NaiveDate>,
    pub genres: Vec<String>,
    /// In provider order. The first entry is the network of record.
    pub networks: Vec<String>,
    pub seasons: Vec<SeasonSummary>,
    /// Only set by endpoints that report it inline (movies).
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SeasonSummary {
    pub season_number: i32,
    pub name: Option<String>,
    pub episode_count: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct SeasonDetail {
    pub id: i32,
    pub season_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<NaiveDate>,
    pub episodes: Vec<EpisodeDetail>,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeDetail {
    pub id: i32,
    pub episode_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<NaiveDate>,
    pub runtime_minutes: Option<i32>,
    pub still_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIds {
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentDetail {
    pub imdb_rating: String,
    pub imdb_votes: String,
    pub metascore: String,
    pub rated: String,
    pub awards: String,
    pub director: String,
    pub actors: String,
    pub ratings: Vec<NamedRating>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRating {
    pub source: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillEpisode {
    pub season_number: i32,
    pub episode_number: i32,
    pub aired: Option<NaiveDate>,
}
