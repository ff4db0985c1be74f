//! Sermon records and the sermon list.
//!
//! Unlike events, sermon records are never rejected: missing or unreadable
//! fields fall back to defaults so one bad upload cannot hide the library.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::UNTITLED_SERMON;
use crate::error::CongregationResult;
use crate::event::DATE_FORMAT;
use crate::store::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sermon {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub audio_url: String,
    pub description: String,
}

impl Sermon {
    /// Build a sermon from a stored node, defaulting whatever is missing.
    /// `now` stands in for a missing or unreadable date.
    pub fn from_stored(key: &str, value: &Value, now: DateTime<Utc>) -> Self {
        let text = |field: &str| value.get(field).and_then(Value::as_str);

        let date = match value.get("date") {
            None | Some(Value::Null) => now,
            Some(raw) => read_sermon_date(raw).unwrap_or_else(|| {
                tracing::warn!(sermon = key, date = %raw, "Unreadable sermon date, using now");
                now
            }),
        };

        Sermon {
            id: key.to_string(),
            title: text("title")
                .filter(|t| !t.is_empty())
                .unwrap_or(UNTITLED_SERMON)
                .to_string(),
            date,
            audio_url: text("audioUrl").unwrap_or_default().to_string(),
            description: text("description").unwrap_or_default().to_string(),
        }
    }

    /// The JSON written to the store (the id is the storage key, not a field).
    pub fn to_value(&self) -> CongregationResult<Value> {
        Ok(serde_json::to_value(StoredSermon {
            title: &self.title,
            date: self.date.to_rfc3339_opts(SecondsFormat::Millis, true),
            audio_url: &self.audio_url,
            description: &self.description,
        })?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSermon<'a> {
    title: &'a str,
    date: String,
    audio_url: &'a str,
    description: &'a str,
}

/// Strings are parsed as dates; numbers are epoch milliseconds.
fn read_sermon_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => parse_sermon_date(text),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Accepts full RFC 3339 timestamps and plain YYYY-MM-DD dates (midnight UTC).
fn parse_sermon_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Every sermon in a `sermons` snapshot, newest first.
pub fn materialize_sermons(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Sermon> {
    let mut sermons: Vec<Sermon> = snapshot
        .children()
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| Sermon::from_stored(&key, value, now))
        .collect();

    // Stable, so sermons sharing a date keep the store's order
    sermons.sort_by(|a, b| b.date.cmp(&a.date));
    sermons
}
