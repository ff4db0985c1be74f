//! Personal calendars: events a member saved for themselves.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use crate::constants::{EVENTS_PATH, USER_EVENTS_PATH};
use crate::error::{CongregationError, CongregationResult};
use crate::event::{EventInstance, EventRecord};
use crate::materialize::materialize;
use crate::month::{MonthView, YearMonth};
use crate::store::{DataStore, join_path};

/// No weekday occurs more than five times in a month.
const MAX_WEEKDAYS_PER_MONTH: usize = 5;

/// Events a user has saved to their own calendar.
///
/// `userEvents/{uid}` maps push keys to event storage keys.
pub struct CalendarService {
    store: Arc<dyn DataStore>,
    fan_out: usize,
}

impl CalendarService {
    pub fn new(store: Arc<dyn DataStore>, fan_out: usize) -> Self {
        CalendarService { store, fan_out }
    }

    async fn saved_keys(&self, uid: &str) -> CongregationResult<Vec<String>> {
        let snapshot = self.store.read(&join_path(&[USER_EVENTS_PATH, uid])).await?;
        let mut keys: Vec<String> = Vec::new();
        for key in snapshot.children().into_iter().filter_map(|(_, v)| v.as_str()) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    async fn saved_records(&self, uid: &str) -> CongregationResult<Vec<(String, EventRecord)>> {
        let keys = self.saved_keys(uid).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let events = self.store.read(EVENTS_PATH).await?;
        let mut records = Vec::new();
        for key in keys {
            // Events deleted since they were saved are skipped
            let Some(value) = events.child(&key) else {
                tracing::debug!(uid, key = %key, "Saved event no longer exists");
                continue;
            };
            if let Some(record) = EventRecord::parse(&key, value)? {
                records.push((key, record));
            }
        }
        Ok(records)
    }

    /// The user's saved events, templates expanded relative to `today`.
    pub async fn user_events(
        &self,
        uid: &str,
        today: NaiveDate,
    ) -> CongregationResult<Vec<EventInstance>> {
        let records = self.saved_records(uid).await?;
        materialize(records, today, self.fan_out)
    }

    /// Save `event_key` to the user's calendar. Returns false when it was
    /// already there.
    pub async fn add_to_calendar(&self, uid: &str, event_key: &str) -> CongregationResult<bool> {
        let events = self.store.read(EVENTS_PATH).await?;
        if events.child(event_key).is_none() {
            return Err(CongregationError::Validation(format!(
                "No event with key '{event_key}'"
            )));
        }

        if self.saved_keys(uid).await?.iter().any(|k| k == event_key) {
            return Ok(false);
        }

        let path = join_path(&[USER_EVENTS_PATH, uid]);
        let push_key = self.store.push_new_key(&path);
        self.store
            .write(
                &join_path(&[&path, &push_key]),
                Value::String(event_key.to_string()),
            )
            .await?;
        tracing::info!(uid, event_key, "Added event to personal calendar");
        Ok(true)
    }

    /// The user's saved events laid out over `month`.
    ///
    /// Templates are expanded from the later of `today` and the first of the
    /// month, far enough to cover the whole month.
    pub async fn month_view(
        &self,
        uid: &str,
        month: YearMonth,
        today: NaiveDate,
    ) -> CongregationResult<MonthView> {
        let records = self.saved_records(uid).await?;
        let from = month.first_day().max(today);
        let instances = materialize(records, from, self.fan_out.max(MAX_WEEKDAYS_PER_MONTH))?;
        Ok(MonthView::build(month, today, &instances))
    }
}
