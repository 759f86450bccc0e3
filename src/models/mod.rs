pub mod episode;
pub mod notification;
pub mod provider;
pub mod timeline;
pub mod title;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Canonical text form for stored timestamps.
///
/// All timestamp columns use this exact format so that lexical comparison in
/// SQL matches chronological order.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[must_use]
pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Parses a provider calendar date (`YYYY-MM-DD`). Empty or malformed input
/// yields `None`, the same as a missing date.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A calendar date is "in the future" when its first instant (UTC midnight)
/// is strictly after `now`. Today's date therefore never counts.
#[must_use]
pub fn is_future_date(date: NaiveDate, now: DateTime<Utc>) -> bool {
    date.and_hms_opt(0, 0, 0)
        .is_some_and(|midnight| midnight.and_utc() > now)
}
