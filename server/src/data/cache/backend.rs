//! Storage seam behind the cache service

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Storage seam for the response cache.
///
/// Implemented by the in-memory backend (single-node dev/test) and the
/// Redis backend (shared across portal instances). Values are opaque
/// bytes; the service layer above decides what they encode.
///
/// # Consistency Notes
///
/// Single-key operations are atomic, but boolean results (`delete`,
/// `exists`) can be stale under concurrent access or TTL expiry. The
/// cache tolerates that: stale answers only cost an extra fetch.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Raw read, `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Raw write, expiring after `ttl` when one is given
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Delete a key from the cache
    ///
    /// Returns `true` if the key existed before deletion, best-effort.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Whether a live entry holds this key
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomic increment, creating the key on first use.
    ///
    /// The TTL is applied only when the increment creates the key, so a
    /// fixed counting window is measured from the first hit. Used for
    /// rate limit counters.
    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, CacheError>;

    /// Remaining lifetime, `None` for missing or non-expiring keys
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Delete keys matching a glob pattern (e.g. `tenant:t1:posts:*`)
    ///
    /// Returns the number of keys removed. A pattern matching nothing is
    /// a successful deletion of zero keys, not an error.
    ///
    /// Performance: O(n) scan for the memory backend, SCAN for Redis.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Round-trip probe for the health and admin endpoints
    async fn health_check(&self) -> Result<(), CacheError>;

    /// Backend name for diagnostics
    fn backend_name(&self) -> &'static str;
}
