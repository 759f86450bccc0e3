use crate::domain::TitleId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SeasonInput {
    pub title_id: TitleId,
    pub season_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub air_date: Option<NaiveDate>,
    pub episode_count: Option<i32>,
    pub tmdb_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct EpisodeInput {
    pub title_id: TitleId,
    pub season_id: Uuid,
    pub season_number: i32,
    pub episode_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    /// `None` leaves any stored date untouched.
    pub air_date: Option<NaiveDate>,
    pub runtime_minutes: Option<i32>,
    pub still_url: Option<String>,
    pub tmdb_id: Option<i32>,
}

/// Result of an episode upsert against its natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeUpsert {
    pub id: Uuid,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: Uuid,
    pub title_id: TitleId,
    pub season_id: Uuid,
    pub season_number: i32,
    pub episode_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<NaiveDate>,
}
