//! The public events listing and admin event creation.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};

use crate::auth::Identity;
use crate::cache::QueryCache;
use crate::constants::{EVENT_IMAGES_PREFIX, EVENTS_PATH};
use crate::error::{CongregationError, CongregationResult};
use crate::event::{
    EventDetails, EventInstance, EventRecord, EventType, Frequency, Recurrence, TIME_FORMAT,
    parse_events,
};
use crate::materialize::materialize;
use crate::storage::{BlobStorage, Upload, UploadKind, object_path, store_upload, validate_image_url};
use crate::store::{DataStore, join_path};

use super::EventSettings;

/// Where a new event's picture comes from.
#[derive(Debug, Clone)]
pub enum EventImage {
    Upload(Upload),
    Url(String),
}

/// An event as submitted by an administrator.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    /// HH:MM
    pub time: String,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub image: EventImage,
    pub kind: EventType,
    pub recurrence: Option<Recurrence>,
    pub is_permanent: bool,
}

enum Schedule {
    Weekly(Recurrence),
    On(NaiveDate),
}

/// Regular events without an explicit pattern repeat on Sundays when the
/// title says so, otherwise on Wednesdays.
pub fn inferred_recurrence(title: &str) -> Recurrence {
    let day_of_week = if title.contains("Sunday") { 0 } else { 3 };
    Recurrence {
        day_of_week,
        frequency: Frequency::Weekly,
    }
}

pub struct EventService {
    store: Arc<dyn DataStore>,
    storage: Arc<dyn BlobStorage>,
    settings: EventSettings,
    cache: QueryCache<NaiveDate, Vec<EventInstance>>,
}

impl EventService {
    pub fn new(
        store: Arc<dyn DataStore>,
        storage: Arc<dyn BlobStorage>,
        settings: EventSettings,
    ) -> Self {
        EventService {
            cache: QueryCache::new(settings.stale_time),
            store,
            storage,
            settings,
        }
    }

    /// Every event, with weekly templates expanded relative to `today`,
    /// sorted by date.
    pub async fn list(&self, today: NaiveDate) -> CongregationResult<Vec<EventInstance>> {
        if let Some(cached) = self.cache.get(&today).await {
            return Ok(cached);
        }

        let instances = self
            .load(today)
            .await
            .map_err(|e| CongregationError::LoadEvents(Box::new(e)))?;

        self.cache.put(today, instances.clone()).await;
        Ok(instances)
    }

    async fn load(&self, today: NaiveDate) -> CongregationResult<Vec<EventInstance>> {
        let snapshot = self.store.read(EVENTS_PATH).await?;
        if !snapshot.exists() {
            return Ok(Vec::new());
        }
        let records = parse_events(&snapshot)?;
        let instances = materialize(records, today, self.settings.fan_out)?;
        tracing::debug!(count = instances.len(), %today, "Materialized events");
        Ok(instances)
    }

    /// Store a new event and return its storage key. Administrators only.
    pub async fn add(&self, identity: &Identity, event: NewEvent) -> CongregationResult<String> {
        identity.require_admin()?;

        if event.title.trim().is_empty() {
            return Err(CongregationError::Validation("Event title is required".into()));
        }
        NaiveTime::parse_from_str(&event.time, TIME_FORMAT).map_err(|_| {
            CongregationError::Validation(format!("Invalid time '{}', expected HH:MM", event.time))
        })?;

        // Settled before anything is uploaded
        let schedule = match (event.kind, event.recurrence, event.date) {
            (_, Some(recurrence), _) => Schedule::Weekly(recurrence),
            (EventType::Regular, None, _) => Schedule::Weekly(inferred_recurrence(&event.title)),
            (EventType::Special, None, Some(date)) => Schedule::On(date),
            (EventType::Special, None, None) => {
                return Err(CongregationError::Validation(
                    "A one-off event needs a date".into(),
                ));
            }
        };

        let image_url = match &event.image {
            EventImage::Upload(upload) => {
                upload.validate(UploadKind::Image)?;
                let path = object_path(
                    EVENT_IMAGES_PREFIX,
                    &upload.file_name,
                    Utc::now().timestamp_millis(),
                );
                store_upload(self.storage.as_ref(), &path, upload).await?
            }
            EventImage::Url(url) => {
                validate_image_url(url)?;
                url.clone()
            }
        };

        let details = EventDetails {
            title: event.title,
            time: event.time,
            description: event.description,
            image_url,
            kind: Some(event.kind),
            is_permanent: event.is_permanent,
        };

        let record = match schedule {
            Schedule::Weekly(recurrence) => EventRecord::Recurring {
                details,
                recurrence,
            },
            Schedule::On(date) => EventRecord::OneOff { details, date },
        };

        let key = self.store.push_new_key(EVENTS_PATH);
        self.store
            .write(&join_path(&[EVENTS_PATH, &key]), record.to_value()?)
            .await?;

        self.cache.invalidate().await;
        tracing::info!(key = %key, by = %identity.id, "Event saved");
        Ok(key)
    }

    /// Drop cached results so the next read goes to the store.
    pub async fn refresh(&self) {
        self.cache.invalidate().await;
    }
}
