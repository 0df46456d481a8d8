//! In-memory cache - the page cache when Redis is not configured.
//!
//! Backed by a bounded `moka` cache: once `max_entries` is reached the least
//! useful entries are evicted, and expired entries are dropped by moka's
//! housekeeping rather than on the next read of the same key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;

use yatube_core::ports::{Cache, CacheError};

/// Upper bound on stored pages unless configured otherwise.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    ttl: Option<Duration>,
}

/// Each entry lives for the TTL it was stored with.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// Process-local cache. Entries are lost on restart.
#[derive(Clone)]
pub struct InMemoryCache {
    store: MokaCache<String, CacheEntry>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        let store = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();
        Self { store }
    }

    /// Entries currently held, after pending evictions have run.
    pub async fn entry_count(&self) -> u64 {
        self.store.run_pending_tasks().await;
        self.store.entry_count()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value: value.to_string(),
            ttl,
        };
        self.store.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let keys: Vec<_> = self
            .store
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();

        for key in keys {
            self.store.invalidate(key.as_str()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("page:/", "body", None).await.unwrap();
        assert_eq!(cache.get("page:/").await, Some("body".to_string()));

        cache.delete("page:/").await.unwrap();
        assert!(!cache.exists("page:/").await);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = InMemoryCache::new();
        cache
            .set("page:/", "body", Some(Duration::from_millis(20)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("page:/").await, None);
    }

    #[tokio::test]
    async fn test_fresh_value_replaces_expired_one() {
        let cache = InMemoryCache::new();
        cache
            .set("index:/", "stale", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache
            .set("index:/", "fresh", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(cache.get("index:/").await, Some("fresh".to_string()));
        assert_eq!(cache.get("index:/").await, Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped_without_reads() {
        let cache = InMemoryCache::new();
        for i in 0..500 {
            cache
                .set(&format!("index:/?x={i}"), "body", Some(Duration::from_millis(1)))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache
            .set("index:/", "live", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = InMemoryCache::with_capacity(50);
        for i in 0..1_000 {
            cache.set(&format!("index:{i}"), "body", None).await.unwrap();
        }
        assert!(cache.entry_count().await <= 50);
    }

    #[tokio::test]
    async fn test_clear_prefix_spares_other_keys() {
        let cache = InMemoryCache::new();
        cache.set("index:/", "a", None).await.unwrap();
        cache.set("index:/?page=2", "b", None).await.unwrap();
        cache.set("other", "c", None).await.unwrap();

        cache.clear_prefix("index:").await.unwrap();

        assert!(!cache.exists("index:/").await);
        assert!(!cache.exists("index:/?page=2").await);
        assert!(cache.exists("other").await);
    }
}
