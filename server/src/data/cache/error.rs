//! Cache error types

use thiserror::Error;

/// Failures internal to the cache layer.
///
/// None of these ever reach an API response. The service layer absorbs
/// every variant into the degraded value for the operation (a miss, a
/// failed write, zero deletions) and logs it.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache configuration: {0}")]
    Config(String),

    #[error("Cache store unreachable: {0}")]
    Connection(String),

    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Cache serialization failed: {0}")]
    Serialization(String),

    #[error("Redis command failed: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool failure: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = CacheError::Config("redis_url required".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid cache configuration: redis_url required"
        );

        let err = CacheError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "Cache store unreachable: refused");

        let err = CacheError::Serialization("trailing bytes".to_string());
        assert_eq!(
            err.to_string(),
            "Cache serialization failed: trailing bytes"
        );
    }

    #[test]
    fn test_timeout_reports_deadline() {
        let err = CacheError::Timeout(250);
        assert_eq!(err.to_string(), "Cache operation timed out after 250ms");
    }
}
