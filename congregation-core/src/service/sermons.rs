//! The sermon library and admin sermon uploads.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::Identity;
use crate::cache::QueryCache;
use crate::constants::{SERMON_AUDIO_PREFIX, SERMONS_PATH};
use crate::error::{CongregationError, CongregationResult};
use crate::sermon::{Sermon, materialize_sermons};
use crate::storage::{BlobStorage, Upload, UploadKind, object_path, store_upload};
use crate::store::{DataStore, join_path};

/// A sermon recording as submitted by an administrator.
#[derive(Debug, Clone)]
pub struct SermonUpload {
    pub title: String,
    pub description: String,
    pub audio: Upload,
}

pub struct SermonService {
    store: Arc<dyn DataStore>,
    storage: Arc<dyn BlobStorage>,
    cache: QueryCache<(), Vec<Sermon>>,
}

impl SermonService {
    pub fn new(
        store: Arc<dyn DataStore>,
        storage: Arc<dyn BlobStorage>,
        stale_time: std::time::Duration,
    ) -> Self {
        SermonService {
            store,
            storage,
            cache: QueryCache::new(stale_time),
        }
    }

    /// All sermons, newest first.
    pub async fn list(&self, now: DateTime<Utc>) -> CongregationResult<Vec<Sermon>> {
        if let Some(cached) = self.cache.get(&()).await {
            return Ok(cached);
        }

        let snapshot = self
            .store
            .read(SERMONS_PATH)
            .await
            .map_err(|e| CongregationError::LoadSermons(Box::new(e)))?;
        let sermons = materialize_sermons(&snapshot, now);

        self.cache.put((), sermons.clone()).await;
        Ok(sermons)
    }

    /// Store the recording, then the sermon record dated `now`.
    pub async fn upload(
        &self,
        identity: &Identity,
        sermon: SermonUpload,
        now: DateTime<Utc>,
    ) -> CongregationResult<Sermon> {
        identity.require_admin()?;

        let title = sermon.title.trim();
        if title.is_empty() {
            return Err(CongregationError::Validation("Sermon title is required".into()));
        }
        sermon.audio.validate(UploadKind::Audio)?;

        let path = object_path(
            SERMON_AUDIO_PREFIX,
            &sermon.audio.file_name,
            now.timestamp_millis(),
        );
        let audio_url = store_upload(self.storage.as_ref(), &path, &sermon.audio).await?;

        let key = self.store.push_new_key(SERMONS_PATH);
        let created = Sermon {
            id: key.clone(),
            title: title.to_string(),
            date: now,
            audio_url,
            description: sermon.description,
        };
        self.store
            .write(&join_path(&[SERMONS_PATH, &key]), created.to_value()?)
            .await?;

        self.cache.invalidate().await;
        tracing::info!(key = %key, by = %identity.id, "Sermon uploaded");
        Ok(created)
    }
}
