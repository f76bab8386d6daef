//! Response cache module
//!
//! Caching infrastructure for the portal API with pluggable backends:
//! - In-memory (default) - uses moka + dashmap
//! - Redis - uses deadpool-redis, for multi-instance deployments
//!
//! The service layer here never surfaces a failure: a broken or slow
//! backend degrades every read to a miss and every write to a no-op,
//! and the request path carries on against the repository. Also
//! provides rate limiting using the cache backend.

mod backend;
mod error;
pub mod invalidation;
mod key;
mod memory;
pub mod policy;
pub mod rate_limiter;
mod redis;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use invalidation::Invalidator;
pub use key::{CacheKey, ListKey, multi_value};
pub use policy::{ResourceFamily, ResourcePolicy, ViewTier};
pub use rate_limiter::{RateLimitBucket, RateLimitResult, RateLimiter};

use memory::MemoryBackend;

use crate::core::config::{CacheBackendType, CacheConfig};

/// Hit/miss/error counters for the admin surface
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CacheStats {
    pub backend: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Degrading wrapper over the cache backend.
///
/// Every operation runs behind a bounded timeout and absorbs every
/// backend failure into the empty value for its return type: reads
/// become misses, writes and deletes report `false`/`0`, counters fall
/// open. Callers never branch on cache errors; the logs and the error
/// counter carry the diagnostics.
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    op_timeout: Duration,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl CacheService {
    /// Create a new cache service from configuration
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendType::Memory => {
                tracing::debug!(
                    max_entries = config.max_entries,
                    "Initializing in-memory cache"
                );
                Arc::new(MemoryBackend::new(config))
            }
            CacheBackendType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    CacheError::Config("redis_url required for Redis backend".into())
                })?;
                // RedisBackend::new logs the sanitized URL internally
                Arc::new(redis::RedisBackend::new(url).await?)
            }
        };

        Ok(Self::with_backend(backend, config))
    }

    /// Wrap an existing backend (tests inject failing or hanging stubs)
    pub fn with_backend(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            op_timeout: Duration::from_millis(config.op_timeout_ms),
            enabled: config.enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Whether caching is enabled at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            backend: self.backend.backend_name(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Run one backend call with the configured deadline.
    ///
    /// A stalled store must not stall a request: past the deadline the
    /// operation is abandoned and reported as a timeout error.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout.as_millis() as u64)),
        }
    }

    fn note_error(&self, op: &'static str, key: &str, e: &CacheError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(op, key = %key, error = %e, "Cache operation degraded");
    }

    // =========================================================================
    // Raw bytes API (cached response envelopes)
    // =========================================================================

    /// Get raw bytes. Errors and timeouts read as a miss.
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        if !self.enabled {
            return None;
        }
        match self.bounded(self.backend.get(key)).await {
            Ok(Some(bytes)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bytes)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.note_error("get", key, &e);
                None
            }
        }
    }

    /// Set raw bytes with a TTL. Returns whether the write landed.
    ///
    /// Writes race invalidations: a populate computed before a mutation
    /// can land after the mutation's invalidation ran. The entry TTL
    /// bounds how long such a stale write can live.
    pub async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.bounded(self.backend.set(key, value, ttl)).await {
            Ok(()) => true,
            Err(e) => {
                self.note_error("set", key, &e);
                false
            }
        }
    }

    // =========================================================================
    // Typed API (JSON, same encoding as the HTTP envelopes)
    // =========================================================================

    /// Get and deserialize a value. Corrupt entries read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get_bytes(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.note_error("get", key, &CacheError::Serialization(e.to_string()));
                None
            }
        }
    }

    /// Serialize and set a value with a TTL. Returns whether it landed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.note_error("set", key, &CacheError::Serialization(e.to_string()));
                return false;
            }
        };
        self.set_bytes(key, bytes, ttl).await
    }

    // =========================================================================
    // Invalidation and counters
    // =========================================================================

    /// Delete a key. Returns whether it existed, `false` on failure.
    pub async fn delete(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match self.bounded(self.backend.delete(key)).await {
            Ok(existed) => existed,
            Err(e) => {
                self.note_error("delete", key, &e);
                false
            }
        }
    }

    /// Delete every key matching a glob pattern. Returns the number of
    /// keys removed; zero both for no matches and for a failed sweep,
    /// so repeating a sweep is always safe.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        if !self.enabled {
            return 0;
        }
        match self.bounded(self.backend.delete_pattern(pattern)).await {
            Ok(count) => {
                tracing::debug!(pattern = %pattern, count, "Cache pattern invalidated");
                count
            }
            Err(e) => {
                self.note_error("delete_pattern", pattern, &e);
                0
            }
        }
    }

    /// Atomic increment with a counting window.
    ///
    /// Falls open to 1 when the store is unreachable: a broken cache
    /// must not lock members out of rate-limited routes.
    pub async fn incr(&self, key: &str, ttl: Option<Duration>) -> i64 {
        if !self.enabled {
            return 1;
        }
        match self.bounded(self.backend.incr(key, ttl)).await {
            Ok(count) => count,
            Err(e) => {
                self.note_error("incr", key, &e);
                1
            }
        }
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match self.bounded(self.backend.exists(key)).await {
            Ok(exists) => exists,
            Err(e) => {
                self.note_error("exists", key, &e);
                false
            }
        }
    }

    /// TTL remaining for a key, `None` for missing or non-expiring keys
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        match self.bounded(self.backend.ttl(key)).await {
            Ok(ttl) => ttl,
            Err(e) => {
                self.note_error("ttl", key, &e);
                None
            }
        }
    }

    /// Health check, for the admin and health endpoints only
    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.bounded(self.backend.health_check()).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;

    /// Backend stub that fails every operation
    pub struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn incr(&self, _key: &str, _ttl: Option<Duration>) -> Result<i64, CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        async fn health_check(&self) -> Result<(), CacheError> {
            Err(CacheError::Connection("store down".into()))
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    /// Backend stub that never completes a read
    pub struct HangingBackend;

    #[async_trait]
    impl CacheBackend for HangingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(false)
        }

        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Ok(false)
        }

        async fn incr(&self, _key: &str, _ttl: Option<Duration>) -> Result<i64, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
            Ok(None)
        }

        async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        }

        async fn health_check(&self) -> Result<(), CacheError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "hanging"
        }
    }

    pub fn memory_config() -> CacheConfig {
        CacheConfig {
            backend: CacheBackendType::Memory,
            max_entries: 1000,
            redis_url: None,
            op_timeout_ms: 250,
            enabled: true,
        }
    }

    pub async fn memory_service() -> CacheService {
        CacheService::new(&memory_config()).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_backend_name() {
        let service = memory_service().await;
        assert_eq!(service.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_typed_get_set_json() {
        let service = memory_service().await;

        #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
        struct Profile {
            id: String,
            name: String,
        }

        let profile = Profile {
            id: "u1".to_string(),
            name: "Ada Alum".to_string(),
        };

        assert!(service.set("tenant:t1:users:id:u1", &profile, None).await);
        let fetched: Option<Profile> = service.get("tenant:t1:users:id:u1").await;
        assert_eq!(fetched, Some(profile));
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_miss() {
        let service = memory_service().await;

        assert!(
            service
                .set_bytes("tenant:t1:posts:id:1", b"{not json".to_vec(), None)
                .await
        );

        #[derive(serde::Deserialize)]
        struct Post {
            #[serde(rename = "id")]
            _id: String,
        }

        let fetched: Option<Post> = service.get("tenant:t1:posts:id:1").await;
        assert!(fetched.is_none());
        assert_eq!(service.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_delete_pattern_counts() {
        let service = memory_service().await;

        service.set_bytes("tenant:t1:posts:all:page:1", b"a".to_vec(), None).await;
        service.set_bytes("tenant:t1:posts:all:page:2", b"b".to_vec(), None).await;
        service.set_bytes("tenant:t1:events:all:page:1", b"c".to_vec(), None).await;

        let deleted = service.delete_pattern("tenant:t1:posts:*").await;
        assert_eq!(deleted, 2);

        assert!(!service.exists("tenant:t1:posts:all:page:1").await);
        assert!(service.exists("tenant:t1:events:all:page:1").await);

        // Sweeping again is a no-op, not a failure
        assert_eq!(service.delete_pattern("tenant:t1:posts:*").await, 0);
    }

    #[tokio::test]
    async fn test_hit_miss_stats() {
        let service = memory_service().await;

        assert!(service.get_bytes("tenant:t1:posts:all").await.is_none());
        service.set_bytes("tenant:t1:posts:all", b"x".to_vec(), None).await;
        assert!(service.get_bytes("tenant:t1:posts:all").await.is_some());

        let stats = service.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_failing_backend_degrades_every_operation() {
        let service = CacheService::with_backend(Arc::new(FailingBackend), &memory_config());

        assert_eq!(service.get_bytes("k").await, None);
        assert!(!service.set_bytes("k", b"v".to_vec(), None).await);
        assert!(!service.delete("k").await);
        assert_eq!(service.delete_pattern("k:*").await, 0);
        assert_eq!(service.incr("k", None).await, 1);
        assert!(!service.exists("k").await);
        assert_eq!(service.ttl("k").await, None);
        assert!(service.health_check().await.is_err());

        assert!(service.stats().errors >= 7);
    }

    #[tokio::test]
    async fn test_hanging_backend_times_out() {
        let mut config = memory_config();
        config.op_timeout_ms = 50;
        let service = CacheService::with_backend(Arc::new(HangingBackend), &config);

        let start = Instant::now();
        assert_eq!(service.get_bytes("k").await, None);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(service.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_disabled_service_is_inert() {
        let mut config = memory_config();
        config.enabled = false;
        let service = CacheService::new(&config).await.unwrap();

        assert!(!service.set_bytes("k", b"v".to_vec(), None).await);
        assert_eq!(service.get_bytes("k").await, None);
        assert!(!service.exists("k").await);

        let stats = service.stats();
        assert_eq!(stats.hits + stats.misses + stats.errors, 0);
    }
}
