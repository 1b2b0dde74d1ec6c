use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Two-tier read-through cache for user summaries and public profiles
///
/// L1 is a per-process moka cache. L2 is Redis, shared across instances, and
/// optional: without a Redis URL the manager runs on L1 alone.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    /// Create a new cache manager
    pub async fn new(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let redis = match redis_url {
            Some(url) if !url.is_empty() => {
                let client = redis::Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                Some(Arc::new(tokio::sync::Mutex::new(manager)))
            }
            _ => None,
        };

        Ok(Self::build(redis, l1_size, ttl_secs))
    }

    /// L1-only cache manager
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self::build(None, l1_size, ttl_secs)
    }

    fn build(redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>, l1_size: u64, ttl_secs: u64) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            redis,
            l1_cache,
            ttl_secs,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn has_l2(&self) -> bool {
        self.redis.is_some()
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET")
                .arg(key)
                .query_async(&mut *conn)
                .await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;
                return Ok(Some(serde_json::from_str(&json)?));
            }
        }

        tracing::trace!("Cache miss: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Set a value in every configured tier
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Delete a value from every configured tier
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Drop every cached view of a user
    ///
    /// Failures are logged, not returned: the write that triggered the
    /// invalidation has already committed.
    pub async fn invalidate_user(&self, user_id: Uuid) {
        for key in [CacheKey::summary(user_id), CacheKey::profile(user_id)] {
            if let Err(e) = self.delete(&key).await {
                tracing::warn!("Failed to invalidate {}: {}", key, e);
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a user summary
    pub fn summary(user_id: Uuid) -> String {
        format!("summary:{}", user_id)
    }

    /// Build a cache key for a public profile
    pub fn profile(user_id: Uuid) -> String {
        format!("profile:{}", user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_l1_set_get_delete() {
        let cache = CacheManager::in_memory(100, 60);
        assert!(!cache.has_l2());

        cache.set("test_key", &"test_value").await.unwrap();
        let result: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(result.as_deref(), Some("test_value"));

        cache.delete("test_key").await.unwrap();
        assert!(cache.get::<String>("test_key").await.unwrap().is_none());

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate_user_drops_both_keys() {
        let cache = CacheManager::in_memory(100, 60);
        let id = Uuid::new_v4();
        cache.set(&CacheKey::summary(id), &1u32).await.unwrap();
        cache.set(&CacheKey::profile(id), &2u32).await.unwrap();

        cache.invalidate_user(id).await;

        assert!(cache.get::<u32>(&CacheKey::summary(id)).await.unwrap().is_none());
        assert!(cache.get::<u32>(&CacheKey::profile(id)).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_redis_set_get() {
        let cache = CacheManager::new(Some("redis://127.0.0.1:6379"), 1000, 60)
            .await
            .expect("Failed to create cache");

        cache.set("heartline_test_key", &42u32).await.unwrap();
        let result: Option<u32> = cache.get("heartline_test_key").await.unwrap();
        assert_eq!(result, Some(42));
        cache.delete("heartline_test_key").await.unwrap();
    }

    #[test]
    fn test_cache_key_builder() {
        let id = Uuid::nil();
        assert_eq!(CacheKey::summary(id), format!("summary:{}", id));
        assert_eq!(CacheKey::profile(id), format!("profile:{}", id));
    }
}
