//! Wiring of the configured data store, identity provider and blob storage.

use std::sync::Arc;

use crate::auth::{AuthProvider, IdentityToolkit, MemoryAuth};
use crate::config::{BackendKind, Settings};
use crate::error::{CongregationError, CongregationResult};
use crate::storage::{BlobStorage, CloudStorage, LocalBlobStorage};
use crate::store::{DataStore, MemoryStore, RealtimeDatabase};

#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn DataStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn BlobStorage>,
}

fn required<'a>(value: &'a Option<String>, key: &str) -> CongregationResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CongregationError::Config(format!("firebase.{key} is required")))
}

impl Backends {
    pub async fn connect(settings: &Settings) -> CongregationResult<Self> {
        match settings.backend.kind {
            BackendKind::Memory => Self::memory(settings).await,
            BackendKind::Firebase => Self::firebase(settings),
        }
    }

    async fn memory(settings: &Settings) -> CongregationResult<Self> {
        let store = match settings.seed_file() {
            Some(path) => {
                tracing::info!(path = %path.display(), "Seeding memory store");
                MemoryStore::from_json_file(&path).await?
            }
            None => MemoryStore::new(),
        };

        let local_dir = settings.local_dir();
        tokio::fs::create_dir_all(&local_dir).await?;
        let storage = LocalBlobStorage::new(local_dir, &settings.storage.public_base_url)?;

        tracing::info!("Using in-memory backend");
        Ok(Backends {
            store: Arc::new(store),
            auth: Arc::new(MemoryAuth::new()),
            storage: Arc::new(storage),
        })
    }

    fn firebase(settings: &Settings) -> CongregationResult<Self> {
        let firebase = &settings.firebase;
        let database_url = required(&firebase.database_url, "database_url")?;
        let api_key = required(&firebase.api_key, "api_key")?;
        let bucket = required(&firebase.storage_bucket, "storage_bucket")?;

        let mut store = RealtimeDatabase::new(database_url)?;
        if let Some(token) = firebase.database_token.as_deref() {
            store = store.with_auth_token(token);
        }

        tracing::info!(database_url, bucket, "Using hosted backend");
        Ok(Backends {
            store: Arc::new(store),
            auth: Arc::new(IdentityToolkit::new(api_key)?),
            storage: Arc::new(CloudStorage::new(bucket)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{BackendSettings, StorageSettings};

    #[tokio::test]
    async fn memory_backend_loads_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, json!({ "events": { "k1": { "title": "Choir" } } }).to_string())
            .unwrap();

        let settings = Settings {
            backend: BackendSettings {
                kind: BackendKind::Memory,
                seed_file: Some(seed),
            },
            storage: StorageSettings {
                local_dir: dir.path().join("uploads"),
                public_base_url: "http://localhost:4180/files/".into(),
            },
            ..Settings::default()
        };

        let backends = Backends::connect(&settings).await.unwrap();
        let events = backends.store.read("events/k1/title").await.unwrap();
        assert_eq!(events.value(), &json!("Choir"));
        assert!(dir.path().join("uploads").is_dir());
    }

    #[tokio::test]
    async fn hosted_backend_requires_project_settings() {
        let settings = Settings {
            backend: BackendSettings {
                kind: BackendKind::Firebase,
                seed_file: None,
            },
            ..Settings::default()
        };

        let err = Backends::connect(&settings).await.err().unwrap();
        assert!(matches!(err, CongregationError::Config(ref m) if m.contains("database_url")));
    }
}
