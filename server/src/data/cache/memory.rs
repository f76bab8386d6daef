//! In-memory cache backend using moka + dashmap
//!
//! Uses moka for the main cache with per-entry TTLs and dashmap for
//! atomic rate limit counters. Suitable for a single portal instance;
//! multi-instance deployments use Redis.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;

use super::backend::CacheBackend;
use super::error::CacheError;
use crate::core::config::CacheConfig;

/// Stored bytes plus what we need to answer `ttl` later
#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Option<Duration>,
    created_at: Instant,
}

/// moka expiry policy that reads each entry's own TTL
///
/// Response TTLs differ per resource view (counters expire in seconds,
/// stats live for hours), so expiry must be read from each entry.
struct VariableTtlExpiry;

impl Expiry<String, CacheEntry> for VariableTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        duration_until_expiry
    }
}

/// Fixed-window counter entry for rate limiting
struct CounterEntry {
    count: AtomicI64,
    expires_at: Instant,
}

/// In-memory cache backend
///
/// Uses:
/// - `moka::Cache` - response entries with TinyLFU eviction and automatic cleanup
/// - `DashMap<CounterEntry>` - atomic fixed-window counters
/// - `cleanup_ops` - tracks operations to trigger periodic counter cleanup
pub struct MemoryBackend {
    cache: Cache<String, CacheEntry>,
    counters: DashMap<String, CounterEntry>,
    /// Ticks once per incr, schedules the counter sweep
    cleanup_ops: AtomicU64,
}

impl MemoryBackend {
    /// Create a new in-memory backend with the given configuration
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            // Pre-size the map so warmup does not rehash
            .initial_capacity((config.max_entries as usize / 4).min(10_000))
            .expire_after(VariableTtlExpiry)
            .build();

        Self {
            cache,
            counters: DashMap::new(),
            cleanup_ops: AtomicU64::new(0),
        }
    }

    /// Drop counters whose window has closed
    fn cleanup_expired_counters(&self) {
        let now = Instant::now();
        self.counters.retain(|_, entry| now < entry.expires_at);
    }
}

/// Match a key against an invalidation pattern.
///
/// Only trailing-`*` globs are supported, which is all the invalidation
/// engine emits. A pattern without a trailing `*` must match the key
/// exactly: prefix-matching there would let `...:id:42` also sweep out
/// `...:id:420`.
fn key_matches(key: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data: value,
            ttl,
            created_at: Instant::now(),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let had_counter = self.counters.remove(key).is_some();
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        Ok(existed || had_counter)
    }

    // Counters live in their own table but share the key namespace, the
    // same way INCR keys and SET keys do in Redis.
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        if let Some(entry) = self.counters.get(key)
            && Instant::now() < entry.expires_at
        {
            return Ok(true);
        }
        Ok(self.cache.contains_key(key))
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, CacheError> {
        use dashmap::mapref::entry::Entry;

        let now = Instant::now();
        let ttl_duration = ttl.unwrap_or(Duration::from_secs(60));
        let expires_at = now + ttl_duration;

        // Entry API gives exclusive access, so expiry check + reset is atomic
        let count = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if now >= counter.expires_at {
                    counter.count.store(1, Ordering::SeqCst);
                    counter.expires_at = expires_at;
                    1
                } else {
                    counter.count.fetch_add(1, Ordering::SeqCst) + 1
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CounterEntry {
                    count: AtomicI64::new(1),
                    expires_at,
                });
                1
            }
        };

        // Expired counters are never read again, so sweep them out every
        // 256 operations to keep the map bounded.
        let ops = self.cleanup_ops.fetch_add(1, Ordering::Relaxed);
        if ops.is_multiple_of(256) {
            self.cleanup_expired_counters();
        }

        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        // Counters first (rate limit windows)
        if let Some(entry) = self.counters.get(key) {
            let now = Instant::now();
            let remaining = entry.expires_at.saturating_duration_since(now);
            if remaining > Duration::ZERO {
                return Ok(Some(remaining));
            }
            return Ok(None);
        }

        // For cache entries, derive remaining TTL from stored metadata
        if let Some(entry) = self.cache.get(key).await {
            if let Some(ttl) = entry.ttl {
                let elapsed = entry.created_at.elapsed();
                if let Some(remaining) = ttl.checked_sub(elapsed)
                    && remaining > Duration::ZERO
                {
                    return Ok(Some(remaining));
                }
                // Past its TTL, eviction just has not run yet
                return Ok(None);
            }
            // Persistent entry, no expiry to report
            return Ok(None);
        }

        Ok(None)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut count = 0u64;

        // Collect keys first (avoid invalidating while iterating)
        // moka hands out Arc<String> keys, clone out of the Arc
        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| key_matches(k, pattern))
            .map(|(k, _)| (*k).clone())
            .collect();

        for key in keys_to_delete {
            self.cache.invalidate(&key).await;
            count += 1;
        }

        // Counters live in their own table and match the same patterns
        self.counters.retain(|k, _| {
            if key_matches(k, pattern) {
                count += 1;
                false
            } else {
                true
            }
        });

        Ok(count)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        // Local map, nothing can be unreachable
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheBackendType;

    fn backend_config() -> CacheConfig {
        CacheConfig {
            backend: CacheBackendType::Memory,
            max_entries: 1000,
            redis_url: None,
            op_timeout_ms: 250,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_set_then_get_returns_bytes() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("posts:front", b"rendered".to_vec(), None)
            .await
            .unwrap();
        let stored = cache.get("posts:front").await.unwrap();
        assert_eq!(stored, Some(b"rendered".to_vec()));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let cache = MemoryBackend::new(&backend_config());

        assert_eq!(cache.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("posts:front", b"rendered".to_vec(), None)
            .await
            .unwrap();
        assert!(cache.delete("posts:front").await.unwrap());
        assert_eq!(cache.get("posts:front").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_false() {
        let cache = MemoryBackend::new(&backend_config());

        assert!(!cache.delete("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists() {
        let cache = MemoryBackend::new(&backend_config());

        assert!(!cache.exists("posts:front").await.unwrap());

        cache
            .set("posts:front", b"rendered".to_vec(), None)
            .await
            .unwrap();
        assert!(cache.exists("posts:front").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_counts_sequentially() {
        let cache = MemoryBackend::new(&backend_config());
        let window = Some(Duration::from_secs(60));

        assert_eq!(cache.incr("window", window).await.unwrap(), 1);
        assert_eq!(cache.incr("window", window).await.unwrap(), 2);
        assert_eq!(cache.incr("window", window).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_counter_visible_to_exists_and_delete() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .incr("guard", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(cache.exists("guard").await.unwrap());

        assert!(cache.delete("guard").await.unwrap());
        assert!(!cache.exists("guard").await.unwrap());

        let count = cache
            .incr("guard", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_expired_counter_does_not_exist() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .incr("guard", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(!cache.exists("guard").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_restarts_after_expiry() {
        let cache = MemoryBackend::new(&backend_config());

        let first = cache
            .incr("window", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        assert_eq!(first, 1);

        tokio::time::sleep(Duration::from_millis(15)).await;

        // Expired window starts over
        let second = cache
            .incr("window", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn test_entries_vanish_after_ttl() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("posts:front", b"rendered".to_vec(), Some(Duration::from_millis(40)))
            .await
            .unwrap();

        assert!(cache.exists("posts:front").await.unwrap());

        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.cache.run_pending_tasks().await;

        assert_eq!(cache.get("posts:front").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern_prefix() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("tenant:t1:posts:all:page:1", b"a".to_vec(), None)
            .await
            .unwrap();
        cache
            .set("tenant:t1:posts:all:page:2", b"b".to_vec(), None)
            .await
            .unwrap();
        cache
            .set("tenant:t1:events:all:page:1", b"c".to_vec(), None)
            .await
            .unwrap();

        let deleted = cache.delete_pattern("tenant:t1:posts:*").await.unwrap();
        assert_eq!(deleted, 2);

        assert!(!cache.exists("tenant:t1:posts:all:page:1").await.unwrap());
        assert!(!cache.exists("tenant:t1:posts:all:page:2").await.unwrap());
        assert!(cache.exists("tenant:t1:events:all:page:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_pattern_exact_does_not_prefix_match() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("tenant:t1:posts:id:42", b"a".to_vec(), None)
            .await
            .unwrap();
        cache
            .set("tenant:t1:posts:id:420", b"b".to_vec(), None)
            .await
            .unwrap();

        let deleted = cache.delete_pattern("tenant:t1:posts:id:42").await.unwrap();
        assert_eq!(deleted, 1);

        assert!(!cache.exists("tenant:t1:posts:id:42").await.unwrap());
        assert!(cache.exists("tenant:t1:posts:id:420").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_pattern_no_match_is_ok() {
        let cache = MemoryBackend::new(&backend_config());

        cache.set("tenant:t1:posts:all", b"a".to_vec(), None).await.unwrap();

        let deleted = cache.delete_pattern("tenant:t2:*").await.unwrap();
        assert_eq!(deleted, 0);
        assert!(cache.exists("tenant:t1:posts:all").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_pattern_sweeps_counters() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .incr("tenant:t1:events:checkins:e1", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        cache
            .set("tenant:t1:events:all", b"a".to_vec(), None)
            .await
            .unwrap();

        let deleted = cache.delete_pattern("tenant:t1:events:*").await.unwrap();
        assert_eq!(deleted, 2);

        // A fresh window proves the old counter is gone
        let count = cache
            .incr("tenant:t1:events:checkins:e1", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_health_check_is_trivially_ok() {
        let cache = MemoryBackend::new(&backend_config());
        assert!(cache.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_reports_memory_name() {
        let cache = MemoryBackend::new(&backend_config());
        assert_eq!(cache.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_ttl_of_live_counter() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .incr("window", Some(Duration::from_secs(90)))
            .await
            .unwrap();
        let remaining = cache.ttl("window").await.unwrap();
        assert!(remaining.is_some());
        assert!(remaining.unwrap() > Duration::from_secs(80));
    }

    #[tokio::test]
    async fn test_ttl_of_expiring_entry() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("posts:front", b"rendered".to_vec(), Some(Duration::from_secs(90)))
            .await
            .unwrap();

        let remaining = cache.ttl("posts:front").await.unwrap();
        assert!(remaining.is_some());
        let secs_left = remaining.unwrap().as_secs();
        assert!((88..=90).contains(&secs_left));
    }

    #[tokio::test]
    async fn test_ttl_of_missing_key() {
        let cache = MemoryBackend::new(&backend_config());

        assert!(cache.ttl("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_of_persistent_entry() {
        let cache = MemoryBackend::new(&backend_config());

        cache
            .set("posts:front", b"rendered".to_vec(), None)
            .await
            .unwrap();

        assert!(cache.ttl("posts:front").await.unwrap().is_none());
    }
}
