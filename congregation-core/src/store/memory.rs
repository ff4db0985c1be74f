//! In-process data store.
//!
//! Holds the whole tree in memory with the same path semantics as the hosted
//! database: missing nodes read as null, writing null deletes, and emptied
//! parents disappear. Used for local development and tests.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::push_id::PushIdGenerator;
use super::{DataStore, Snapshot};
use crate::error::{CongregationError, CongregationResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    root: RwLock<Value>,
    keys: PushIdGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree.
    pub fn with_data(root: Value) -> Self {
        MemoryStore {
            root: RwLock::new(root),
            keys: PushIdGenerator::new(),
        }
    }

    /// Start from a JSON export of the database.
    pub async fn from_json_file(path: &Path) -> CongregationResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let root: Value = serde_json::from_str(&content).map_err(|e| {
            CongregationError::Config(format!("Invalid seed file {}: {e}", path.display()))
        })?;
        Ok(Self::with_data(root))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn get_at<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(node, |node, segment| match node {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
        if child.is_null() || child.as_object().is_some_and(Map::is_empty) {
            map.remove(*first);
        }
    }

    if node.as_object().is_some_and(Map::is_empty) {
        *node = Value::Null;
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn read(&self, path: &str) -> CongregationResult<Snapshot> {
        let root = self.root.read().await;
        let value = get_at(&root, &segments(path))
            .cloned()
            .unwrap_or(Value::Null);
        tracing::debug!(path, exists = !value.is_null(), "Memory store read");
        Ok(Snapshot::new(path, value))
    }

    async fn write(&self, path: &str, value: Value) -> CongregationResult<()> {
        tracing::debug!(path, delete = value.is_null(), "Memory store write");
        let mut root = self.root.write().await;
        set_at(&mut root, &segments(path), value);
        Ok(())
    }

    fn push_new_key(&self, _path: &str) -> String {
        self.keys.generate()
    }
}
