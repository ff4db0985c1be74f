//! Event types.
//!
//! Stored event records are loosely shaped JSON in the database. They are
//! parsed into [`EventRecord`] at the store boundary, so everything past that
//! point works with one of three well-formed shapes. [`EventInstance`] is what
//! the site displays: a record resolved to a concrete date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CongregationError, CongregationResult};
use crate::occurrence::weekday_from_index;
use crate::store::Snapshot;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Regular,
    #[default]
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
}

/// A weekly recurrence pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub frequency: Frequency,
}

impl Recurrence {
    pub fn weekly(day_of_week: i64) -> CongregationResult<Self> {
        weekday_from_index(day_of_week)?;
        Ok(Recurrence {
            // In range after the check above
            day_of_week: day_of_week as u8,
            frequency: Frequency::Weekly,
        })
    }
}

/// Fields shared by every kind of stored event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDetails {
    pub title: String,
    /// HH:MM
    pub time: String,
    pub description: String,
    pub image_url: String,
    /// Absent in older records; defaulted when materialized
    pub kind: Option<EventType>,
    pub is_permanent: bool,
}

/// A stored event, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum EventRecord {
    /// A single event on a fixed date.
    OneOff {
        details: EventDetails,
        date: NaiveDate,
    },
    /// A weekly template expanded into dated instances at read time.
    Recurring {
        details: EventDetails,
        recurrence: Recurrence,
    },
    /// Neither a date nor a weekly recurrence. New writes are rejected in
    /// this shape, but older records may still be stored like this.
    Undated { details: EventDetails },
}

/// The loose shape events are stored in.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recurrence: Option<StoredRecurrence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_permanent: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecurrence {
    #[serde(default)]
    day_of_week: Option<i64>,
    #[serde(default)]
    frequency: Option<String>,
}

impl EventRecord {
    pub fn details(&self) -> &EventDetails {
        match self {
            EventRecord::OneOff { details, .. }
            | EventRecord::Recurring { details, .. }
            | EventRecord::Undated { details } => details,
        }
    }

    /// Parse a stored event. `Ok(None)` for an empty (null) node.
    ///
    /// Only a recurrence with a weekly frequency makes a record a template;
    /// any other recurrence value is ignored and the record is treated by its
    /// date like a one-off event.
    pub fn parse(key: &str, value: &Value) -> CongregationResult<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }

        let stored: StoredEvent =
            serde_json::from_value(value.clone()).map_err(|e| CongregationError::MalformedRecord {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let details = EventDetails {
            title: stored.title.unwrap_or_default(),
            time: stored.time.unwrap_or_default(),
            description: stored.description.unwrap_or_default(),
            image_url: stored.image_url.unwrap_or_default(),
            kind: stored.kind,
            is_permanent: stored.is_permanent.unwrap_or(false),
        };

        let weekly = stored
            .recurrence
            .filter(|r| r.frequency.as_deref() == Some("weekly"));

        if let Some(recurrence) = weekly {
            let day_of_week =
                recurrence
                    .day_of_week
                    .ok_or_else(|| CongregationError::MalformedRecord {
                        key: key.to_string(),
                        reason: "weekly recurrence without dayOfWeek".into(),
                    })?;
            let recurrence = Recurrence::weekly(day_of_week)?;
            return Ok(Some(EventRecord::Recurring {
                details,
                recurrence,
            }));
        }

        match stored.date {
            Some(date) => {
                let date = NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|_| {
                    CongregationError::MalformedRecord {
                        key: key.to_string(),
                        reason: format!("invalid date '{date}', expected YYYY-MM-DD"),
                    }
                })?;
                Ok(Some(EventRecord::OneOff { details, date }))
            }
            None => Ok(Some(EventRecord::Undated { details })),
        }
    }

    /// The JSON written to the store for this record.
    pub fn to_value(&self) -> CongregationResult<Value> {
        let details = self.details();
        let mut stored = StoredEvent {
            title: Some(details.title.clone()),
            time: Some(details.time.clone()),
            description: Some(details.description.clone()),
            image_url: Some(details.image_url.clone()),
            kind: details.kind,
            is_permanent: details.is_permanent.then_some(true),
            ..StoredEvent::default()
        };

        match self {
            EventRecord::OneOff { date, .. } => {
                stored.date = Some(date.format(DATE_FORMAT).to_string());
            }
            EventRecord::Recurring { recurrence, .. } => {
                stored.recurrence = Some(StoredRecurrence {
                    day_of_week: Some(i64::from(recurrence.day_of_week)),
                    frequency: Some("weekly".into()),
                });
            }
            EventRecord::Undated { .. } => {}
        }

        Ok(serde_json::to_value(stored)?)
    }
}

/// Parse every child of an `events` snapshot, in the store's order.
pub fn parse_events(snapshot: &Snapshot) -> CongregationResult<Vec<(String, EventRecord)>> {
    let mut records = Vec::new();
    for (key, value) in snapshot.children() {
        if let Some(record) = EventRecord::parse(&key, value)? {
            records.push((key, record));
        }
    }
    Ok(records)
}

/// An event as displayed: a stored record resolved to a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInstance {
    /// Storage key for one-off events, `{key}-{index}` for template occurrences
    pub id: String,
    /// Storage key of the record this instance came from
    pub source_key: String,
    pub title: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub description: String,
    pub image_url: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_permanent: bool,
}
