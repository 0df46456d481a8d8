//! Redis cache - shares the page cache between server processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use yatube_core::ports::{Cache, CacheError};

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// e.g. `redis://localhost:6379`
    pub url: String,
    pub connect_timeout: Duration,
    /// Prepended to every key so several sites can share one Redis.
    pub namespace: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(5),
            namespace: "yatube:".to_string(),
        }
    }
}

/// Redis-backed cache. The connection manager reconnects on its own.
pub struct RedisCache {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisCache {
    pub async fn connect(config: RedisConfig) -> Result<Self, CacheError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Connection("Connection timed out".to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis cache");

        Ok(Self {
            conn,
            namespace: config.namespace,
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

fn operation(e: redis::RedisError) -> CacheError {
    CacheError::Operation(e.to_string())
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(self.key(key)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Redis GET failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let key = self.key(key);

        match ttl {
            // SETEX rejects a zero expiry.
            Some(duration) => conn
                .set_ex::<_, _, ()>(key, value, duration.as_secs().max(1))
                .await
                .map_err(operation),
            None => conn.set::<_, _, ()>(key, value).await.map_err(operation),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.key(key)).await.map_err(operation)
    }

    async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(self.key(key)).await.unwrap_or(false)
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let keys = conn
            .keys::<_, Vec<String>>(format!("{}*", self.key(prefix)))
            .await
            .map_err(operation)?;

        if keys.is_empty() {
            return Ok(());
        }

        tracing::debug!(prefix = %prefix, count = keys.len(), "Clearing cached keys");
        conn.del::<_, ()>(keys).await.map_err(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Runs against REDIS_URL when one is reachable, otherwise passes vacuously.
    async fn test_cache() -> Option<RedisCache> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6389".into());
        let config = RedisConfig {
            connect_timeout: Duration::from_secs(1),
            namespace: "yatube-test:".to_string(),
            ..RedisConfig::new(url)
        };

        RedisCache::connect(config).await.ok()
    }

    #[tokio::test]
    async fn test_redis_cache_set_get() {
        let Some(cache) = test_cache().await else {
            return;
        };

        cache.set("page", "body", None).await.unwrap();
        assert_eq!(cache.get("page").await, Some("body".to_string()));

        cache.delete("page").await.unwrap();
        assert_eq!(cache.get("page").await, None);
    }

    #[tokio::test]
    async fn test_redis_cache_clear_prefix() {
        let Some(cache) = test_cache().await else {
            return;
        };

        cache.set("index:/", "a", None).await.unwrap();
        cache.set("index:/?page=2", "b", None).await.unwrap();
        cache.set("kept", "c", None).await.unwrap();

        cache.clear_prefix("index:").await.unwrap();

        assert!(!cache.exists("index:/").await);
        assert!(cache.exists("kept").await);
        cache.delete("kept").await.unwrap();
    }
}
