//! Data store port.
//!
//! The site's data lives in a hosted realtime database: one JSON tree
//! addressed by slash-separated paths. [`DataStore`] is the slice of that
//! client the site needs; [`MemoryStore`] and [`RealtimeDatabase`] implement it.

mod memory;
pub mod push_id;
mod realtime;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CongregationResult;

pub use memory::MemoryStore;
pub use realtime::RealtimeDatabase;

/// Read/write-by-path access to the database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Read the node at `path`. A missing node is an empty snapshot, not an error.
    async fn read(&self, path: &str) -> CongregationResult<Snapshot>;

    /// Replace the node at `path`. Writing `null` deletes it.
    async fn write(&self, path: &str, value: Value) -> CongregationResult<()>;

    /// Generate a fresh child key under `path`. Nothing is written.
    fn push_new_key(&self, path: &str) -> String;
}

/// The value of a node at the time it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: String,
    value: Value,
}

impl Snapshot {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Snapshot {
            path: path.into(),
            value,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Child nodes in key order, skipping empty ones.
    ///
    /// The database hands back sequential integer keys as an array; those
    /// are reported with their index as the key.
    pub fn children(&self) -> Vec<(String, &Value)> {
        match &self.value {
            Value::Object(map) => map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn child(&self, key: &str) -> Option<&Value> {
        match &self.value {
            Value::Object(map) => map.get(key).filter(|v| !v.is_null()),
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .filter(|v| !v.is_null()),
            _ => None,
        }
    }
}

/// Join path segments with `/`, ignoring empty segments and stray slashes.
pub fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
