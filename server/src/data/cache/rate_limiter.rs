//! Fixed-window rate limiting over the cache's atomic counters
//!
//! Each bucket counts requests in windows opened by the first hit and
//! closed by the counter key's TTL.
//!
//! # Known Limitations
//!
//! A fixed window admits up to twice the limit across a boundary (a
//! full budget at the end of one window and again at the start of the
//! next). Acceptable here; a sliding window would cost more cache
//! round trips per request.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::CacheService;
use super::key::CacheKey;
use crate::core::constants::DEFAULT_RATE_LIMIT_WINDOW_SECS;

/// One traffic class and its budget
#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    /// Bucket name, becomes part of the counter key
    pub name: &'static str,
    /// Base requests per window
    pub requests_per_window: u32,
    /// Counting window length in seconds
    pub window_secs: u64,
    /// Headroom granted above the base limit
    pub burst: u32,
}

impl RateLimitBucket {
    /// Bucket for read traffic (member browsing)
    pub fn api(rpm: u32) -> Self {
        Self {
            name: "api",
            requests_per_window: rpm,
            window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            burst: rpm / 20, // 5% headroom
        }
    }

    /// Bucket for write endpoints (posting, feedback, profile edits)
    pub fn mutation(rpm: u32) -> Self {
        Self {
            name: "mutation",
            requests_per_window: rpm,
            window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            burst: rpm / 10, // 10% headroom
        }
    }

    /// Bucket for the admin console surface
    pub fn admin(rpm: u32) -> Self {
        Self {
            name: "admin",
            requests_per_window: rpm,
            window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            burst: rpm / 5, // 20% headroom
        }
    }

    /// Effective limit, base plus burst
    pub fn total_limit(&self) -> u32 {
        self.requests_per_window.saturating_add(self.burst)
    }
}

/// Outcome of one budget check, rendered into `x-ratelimit-*` headers
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left before the window closes
    pub remaining: u32,
    /// Effective limit including burst
    pub limit: u32,
    /// Epoch seconds when the window reopens
    pub reset_at: u64,
    /// Seconds to wait, set only when blocked
    pub retry_after: Option<u64>,
}

/// Counts requests against bucket budgets using the cache's counters.
///
/// Fails open by construction: when the store is unreachable the
/// service's `incr` reports a count of 1, so members are never locked
/// out by a cache outage.
pub struct RateLimiter {
    cache: Arc<CacheService>,
}

impl RateLimiter {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Count this request against the bucket's window.
    pub async fn check(&self, bucket: &RateLimitBucket, identifier: &str) -> RateLimitResult {
        let key = CacheKey::rate_limit(bucket.name, identifier);
        let window_duration = Duration::from_secs(bucket.window_secs);

        // Capture time before the increment so reset_at never predates
        // the window start
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Clock reads before the UNIX epoch");
                0
            });

        let count = self.cache.incr(&key, Some(window_duration)).await;

        let limit = bucket.total_limit();
        let limit_i64 = i64::from(limit);
        let allowed = count <= limit_i64;
        let remaining = u32::try_from(limit_i64.saturating_sub(count)).unwrap_or(0);

        // The counter key's TTL tells us when this window closes
        let window_left = self
            .cache
            .ttl(&key)
            .await
            .map_or(bucket.window_secs, |d| d.as_secs());
        let reset_at = now.saturating_add(window_left);

        tracing::trace!(
            bucket = bucket.name,
            %identifier,
            count,
            limit,
            allowed,
            "Rate limit check"
        );

        RateLimitResult {
            allowed,
            remaining,
            limit,
            reset_at,
            retry_after: if allowed {
                None
            } else {
                Some(reset_at.saturating_sub(now))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::test_support::{FailingBackend, memory_config, memory_service};

    fn probe_bucket(base: u32, burst: u32) -> RateLimitBucket {
        RateLimitBucket {
            name: "probe",
            requests_per_window: base,
            window_secs: 60,
            burst,
        }
    }

    #[tokio::test]
    async fn test_under_budget_requests_pass() {
        let limiter = RateLimiter::new(Arc::new(memory_service().await));
        let bucket = RateLimitBucket::api(100);

        for i in 0..50 {
            let result = limiter.check(&bucket, "203.0.113.7").await;
            assert!(result.allowed, "request {i} is within budget");
            assert!(result.remaining > 0);
            assert!(result.retry_after.is_none());
        }
    }

    #[tokio::test]
    async fn test_over_budget_requests_are_blocked() {
        let limiter = RateLimiter::new(Arc::new(memory_service().await));
        let bucket = probe_bucket(5, 0);

        for i in 0..5 {
            let result = limiter.check(&bucket, "203.0.113.7").await;
            assert!(result.allowed, "request {i} is within budget");
        }

        let result = limiter.check(&bucket, "203.0.113.7").await;
        assert!(!result.allowed, "request 6 must be rejected");
        assert!(result.retry_after.is_some());
    }

    #[tokio::test]
    async fn test_burst_extends_the_window_budget() {
        let limiter = RateLimiter::new(Arc::new(memory_service().await));
        let bucket = probe_bucket(10, 5);

        for i in 0..15 {
            let result = limiter.check(&bucket, "203.0.113.7").await;
            assert!(result.allowed, "request {i} fits base plus burst");
        }

        let result = limiter.check(&bucket, "203.0.113.7").await;
        assert!(!result.allowed, "request 16 exceeds base plus burst");
    }

    #[tokio::test]
    async fn test_identifiers_count_separately() {
        let limiter = RateLimiter::new(Arc::new(memory_service().await));
        let bucket = probe_bucket(5, 0);

        for _ in 0..5 {
            limiter.check(&bucket, "203.0.113.7").await;
        }
        let result = limiter.check(&bucket, "203.0.113.7").await;
        assert!(!result.allowed);

        let result = limiter.check(&bucket, "203.0.113.8").await;
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn test_bucket_presets() {
        let api = RateLimitBucket::api(600);
        assert_eq!(api.name, "api");
        assert_eq!(api.requests_per_window, 600);
        assert_eq!(api.burst, 30); // 5%

        let mutation = RateLimitBucket::mutation(90);
        assert_eq!(mutation.name, "mutation");
        assert_eq!(mutation.requests_per_window, 90);
        assert_eq!(mutation.burst, 9); // 10%

        let admin = RateLimitBucket::admin(40);
        assert_eq!(admin.name, "admin");
        assert_eq!(admin.requests_per_window, 40);
        assert_eq!(admin.burst, 8); // 20%
    }

    #[tokio::test]
    async fn test_result_matches_header_contract() {
        let limiter = RateLimiter::new(Arc::new(memory_service().await));
        let bucket = probe_bucket(10, 5);

        let result = limiter.check(&bucket, "203.0.113.7").await;
        assert!(result.allowed);
        assert_eq!(result.limit, 15);
        assert_eq!(result.remaining, 14);
        assert!(result.reset_at > 0);
        assert!(result.retry_after.is_none());
    }

    #[tokio::test]
    async fn test_fails_open_when_store_is_down() {
        let service = CacheService::with_backend(Arc::new(FailingBackend), &memory_config());
        let limiter = RateLimiter::new(Arc::new(service));
        let bucket = probe_bucket(1, 0);

        // Every check sees count 1: at the limit, never over it
        for _ in 0..10 {
            let result = limiter.check(&bucket, "203.0.113.7").await;
            assert!(result.allowed);
        }
    }
}
