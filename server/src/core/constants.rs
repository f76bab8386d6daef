// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "AlumNet";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "alumnet";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "alumnet.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "ALUMNET_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "ALUMNET_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "ALUMNET_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "ALUMNET_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "ALUMNET_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5000;

// =============================================================================
// Tenancy Headers
// =============================================================================

/// Request header carrying the organization (tenant) id
pub const TENANT_HEADER: &str = "x-org-id";

/// Request header carrying the authenticated member id
pub const VIEWER_HEADER: &str = "x-user-id";

/// Response header reporting cache disposition (HIT, MISS, BYPASS)
pub const CACHE_STATUS_HEADER: &str = "x-cache";

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Cache
// =============================================================================

/// Environment variable for cache backend (memory or redis)
pub const ENV_CACHE_BACKEND: &str = "ALUMNET_CACHE_BACKEND";

/// Environment variable for cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "ALUMNET_CACHE_MAX_ENTRIES";

/// Environment variable for Redis-compatible cache URL
pub const ENV_CACHE_REDIS_URL: &str = "ALUMNET_CACHE_REDIS_URL";

/// Environment variable for per-operation cache timeout in milliseconds
pub const ENV_CACHE_OP_TIMEOUT_MS: &str = "ALUMNET_CACHE_OP_TIMEOUT_MS";

/// Environment variable to disable caching entirely
pub const ENV_CACHE_ENABLED: &str = "ALUMNET_CACHE_ENABLED";

/// Default cache max entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Default Redis URL (works with Redis, Valkey, Dragonfly)
pub const DEFAULT_CACHE_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// Default per-operation cache timeout in milliseconds
///
/// Bounds every store round trip so a stalled cache cannot stall a
/// request; a timed-out read is served as a miss.
pub const DEFAULT_CACHE_OP_TIMEOUT_MS: u64 = 250;

/// Maximum length of a single sanitized cache key value segment.
/// Longer values are truncated and suffixed with a content hash.
pub const MAX_KEY_VALUE_LEN: usize = 40;

/// Largest response body the read-through layer will cache (256 KB)
pub const MAX_CACHEABLE_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// Redis Pool
// =============================================================================

/// Redis connection pool max size
pub const REDIS_POOL_MAX_SIZE: usize = 16;

/// Redis pool wait/create/recycle timeout in seconds
pub const REDIS_POOL_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Rate Limiting
// =============================================================================

/// Environment variable for rate limit enabled
pub const ENV_RATE_LIMIT_ENABLED: &str = "ALUMNET_RATE_LIMIT_ENABLED";

/// Environment variable for API rate limit (requests per minute)
pub const ENV_RATE_LIMIT_API_RPM: &str = "ALUMNET_RATE_LIMIT_API_RPM";

/// Environment variable for mutation rate limit (requests per minute)
pub const ENV_RATE_LIMIT_MUTATION_RPM: &str = "ALUMNET_RATE_LIMIT_MUTATION_RPM";

/// Environment variable for admin rate limit (requests per minute)
pub const ENV_RATE_LIMIT_ADMIN_RPM: &str = "ALUMNET_RATE_LIMIT_ADMIN_RPM";

/// Environment variable for rate limit bypass header secret
pub const ENV_RATE_LIMIT_BYPASS_HEADER: &str = "ALUMNET_RATE_LIMIT_BYPASS_HEADER";

/// Default API rate limit (requests per minute)
pub const DEFAULT_RATE_LIMIT_API_RPM: u32 = 300;

/// Default mutation rate limit (requests per minute)
pub const DEFAULT_RATE_LIMIT_MUTATION_RPM: u32 = 60;

/// Default admin rate limit (requests per minute)
pub const DEFAULT_RATE_LIMIT_ADMIN_RPM: u32 = 30;

/// Rate limit window in seconds (fixed 1-minute window)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
