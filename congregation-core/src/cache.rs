//! Single-entry query cache with a staleness window.
//!
//! A cached result is served until it is older than the staleness window or
//! was computed for a different key (e.g. a different day). Writers call
//! [`QueryCache::invalidate`] so the next read goes back to the store.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug)]
struct Entry<K, T> {
    key: K,
    value: T,
    fetched_at: Instant,
}

#[derive(Debug)]
pub struct QueryCache<K, T> {
    stale_time: Duration,
    entry: RwLock<Option<Entry<K, T>>>,
}

impl<K, T> QueryCache<K, T>
where
    K: PartialEq,
    T: Clone,
{
    pub fn new(stale_time: Duration) -> Self {
        QueryCache {
            stale_time,
            entry: RwLock::new(None),
        }
    }

    /// The cached value for `key`, if it is still fresh.
    pub async fn get(&self, key: &K) -> Option<T> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|e| &e.key == key && e.fetched_at.elapsed() < self.stale_time)
            .map(|e| e.value.clone())
    }

    pub async fn put(&self, key: K, value: T) {
        *self.entry.write().await = Some(Entry {
            key,
            value,
            fetched_at: Instant::now(),
        });
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_fresh_value_for_same_key() {
        let cache = QueryCache::new(Duration::from_secs(300));
        cache.put(1, vec!["a"]).await;
        assert_eq!(cache.get(&1).await, Some(vec!["a"]));
        assert_eq!(cache.get(&2).await, None);
    }

    #[tokio::test]
    async fn stale_values_are_not_served() {
        let cache = QueryCache::new(Duration::ZERO);
        cache.put((), 7).await;
        assert_eq!(cache.get(&()).await, None);
    }

    #[tokio::test]
    async fn invalidate_drops_the_entry() {
        let cache = QueryCache::new(Duration::from_secs(300));
        cache.put((), 7).await;
        cache.invalidate().await;
        assert_eq!(cache.get(&()).await, None);
    }
}
