use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_OP_TIMEOUT_MS,
    DEFAULT_CACHE_REDIS_URL, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RATE_LIMIT_ADMIN_RPM,
    DEFAULT_RATE_LIMIT_API_RPM, DEFAULT_RATE_LIMIT_MUTATION_RPM,
};

// =============================================================================
// Backend selection
// =============================================================================

/// Which store backs the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

// =============================================================================
// File layer (JSON)
// =============================================================================

/// `server` section of the config file
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// `cache` section of the config file
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    /// Store flavor, memory unless told otherwise
    pub backend: Option<CacheBackendType>,
    /// Entry cap for the memory store
    pub max_entries: Option<u64>,
    /// URL of the Redis-compatible store
    pub redis_url: Option<String>,
    /// Per-operation timeout in milliseconds
    pub op_timeout_ms: Option<u64>,
    /// Disable caching entirely (responses always served from the repository)
    pub enabled: Option<bool>,
}

/// `rate_limit` section of the config file
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RateLimitFileConfig {
    pub enabled: Option<bool>,
    pub api_rpm: Option<u32>,
    pub mutation_rpm: Option<u32>,
    pub admin_rpm: Option<u32>,
    pub bypass_header: Option<String>,
}

/// Shape of the optional JSON config file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub rate_limit: Option<RateLimitFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Read and parse one JSON config file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Reading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Config file {} is not valid JSON", path.display()))?;
        tracing::trace!(parsed = ?config, "Config file contents");
        Ok(config)
    }

    /// Surface file keys the server never reads
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Config file has keys the server never reads"
            );
        }
    }

    /// Fold `other` onto this config, field by field, `other` winning
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "server.host from overlay");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "server.port from overlay");
                current.port = server.port;
            }
        }

        // Cache
        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.backend.is_some() {
                tracing::trace!(backend = ?cache.backend, "cache.backend from overlay");
                current.backend = cache.backend;
            }
            if cache.max_entries.is_some() {
                tracing::trace!(max_entries = ?cache.max_entries, "cache.max_entries from overlay");
                current.max_entries = cache.max_entries;
            }
            if cache.redis_url.is_some() {
                tracing::trace!(redis_url = "***", "cache.redis_url from overlay");
                current.redis_url = cache.redis_url;
            }
            if cache.op_timeout_ms.is_some() {
                tracing::trace!(op_timeout_ms = ?cache.op_timeout_ms, "cache.op_timeout_ms from overlay");
                current.op_timeout_ms = cache.op_timeout_ms;
            }
            if cache.enabled.is_some() {
                tracing::trace!(enabled = ?cache.enabled, "cache.enabled from overlay");
                current.enabled = cache.enabled;
            }
        }

        // Rate Limit
        if let Some(rate_limit) = other.rate_limit {
            let current = self
                .rate_limit
                .get_or_insert_with(RateLimitFileConfig::default);
            if rate_limit.enabled.is_some() {
                tracing::trace!(enabled = ?rate_limit.enabled, "rate_limit.enabled from overlay");
                current.enabled = rate_limit.enabled;
            }
            if rate_limit.api_rpm.is_some() {
                tracing::trace!(api_rpm = ?rate_limit.api_rpm, "rate_limit.api_rpm from overlay");
                current.api_rpm = rate_limit.api_rpm;
            }
            if rate_limit.mutation_rpm.is_some() {
                tracing::trace!(mutation_rpm = ?rate_limit.mutation_rpm, "rate_limit.mutation_rpm from overlay");
                current.mutation_rpm = rate_limit.mutation_rpm;
            }
            if rate_limit.admin_rpm.is_some() {
                tracing::trace!(admin_rpm = ?rate_limit.admin_rpm, "rate_limit.admin_rpm from overlay");
                current.admin_rpm = rate_limit.admin_rpm;
            }
            if rate_limit.bypass_header.is_some() {
                tracing::trace!(bypass_header = "***", "rate_limit.bypass_header from overlay");
                current.bypass_header = rate_limit.bypass_header;
            }
        }

        // Debug
        if other.debug.is_some() {
            tracing::trace!(debug = ?other.debug, "debug from overlay");
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Resolved runtime layer
// =============================================================================

/// Bind address for the HTTP listener
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Cache configuration (used by CacheService)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Selected store
    pub backend: CacheBackendType,
    /// Entry cap, memory store only
    pub max_entries: u64,
    /// Store URL, redis only
    pub redis_url: Option<String>,
    /// Per-operation timeout in milliseconds
    pub op_timeout_ms: u64,
    /// Whether caching is enabled at all
    pub enabled: bool,
}

/// Resolved rate limit settings
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub api_rpm: u32,
    pub mutation_rpm: u32,
    pub admin_rpm: u32,
    pub bypass_header: Option<String>,
}

/// Everything resolved, the struct the rest of the server reads
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Resolve the runtime configuration.
    ///
    /// Sources, lowest to highest precedence:
    /// 1. Defaults
    /// 2. JSON file, local directory or the `--config` path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Resolving configuration");
        tracing::trace!(?cli, "CLI overrides");

        let mut file_config = FileConfig::default();

        let config_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = config_path {
            let overlay = FileConfig::load_from_file(&path)?;
            overlay.warn_unknown_fields();
            file_config.merge(overlay);
            tracing::debug!(path = %path.display(), "Config file loaded");
        }

        // Extract file config values with defaults
        let file_server = file_config.server.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_rate_limit = file_config.rate_limit.unwrap_or_default();

        // Layer configs: defaults -> file config -> CLI/env overrides
        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        // debug is sticky: either surface can switch it on
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        // Cache settings, CLI/env first
        let cache_backend = cli.cache_backend.or(file_cache.backend).unwrap_or_default();
        let cache_max_entries = cli
            .cache_max_entries
            .or(file_cache.max_entries)
            .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
        let cache_op_timeout_ms = cli
            .cache_op_timeout_ms
            .or(file_cache.op_timeout_ms)
            .unwrap_or(DEFAULT_CACHE_OP_TIMEOUT_MS);
        let cache_enabled = cli.cache_enabled.or(file_cache.enabled).unwrap_or(true);

        // Redis URL falls back to the conventional local instance so that
        // `--cache-backend redis` works out of the box
        let cache_redis_url = if cache_backend == CacheBackendType::Redis {
            Some(
                cli.cache_redis_url
                    .clone()
                    .or(file_cache.redis_url)
                    .unwrap_or_else(|| DEFAULT_CACHE_REDIS_URL.to_string()),
            )
        } else {
            cli.cache_redis_url.clone().or(file_cache.redis_url)
        };

        let cache = CacheConfig {
            backend: cache_backend,
            max_entries: cache_max_entries,
            redis_url: cache_redis_url,
            op_timeout_ms: cache_op_timeout_ms,
            enabled: cache_enabled,
        };

        // Rate limit settings, CLI/env first
        let rate_limit = RateLimitConfig {
            enabled: cli
                .rate_limit_enabled
                .or(file_rate_limit.enabled)
                .unwrap_or(true),
            api_rpm: cli
                .rate_limit_api_rpm
                .or(file_rate_limit.api_rpm)
                .unwrap_or(DEFAULT_RATE_LIMIT_API_RPM),
            mutation_rpm: cli
                .rate_limit_mutation_rpm
                .or(file_rate_limit.mutation_rpm)
                .unwrap_or(DEFAULT_RATE_LIMIT_MUTATION_RPM),
            admin_rpm: cli
                .rate_limit_admin_rpm
                .or(file_rate_limit.admin_rpm)
                .unwrap_or(DEFAULT_RATE_LIMIT_ADMIN_RPM),
            bypass_header: cli
                .rate_limit_bypass_header
                .clone()
                .or(file_rate_limit.bypass_header),
        };

        let config = Self {
            server: ServerConfig { host, port },
            cache,
            rate_limit,
            debug,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            debug = config.debug,
            cache_backend = %config.cache.backend,
            cache_max_entries = config.cache.max_entries,
            cache_op_timeout_ms = config.cache.op_timeout_ms,
            cache_enabled = config.cache.enabled,
            rate_limit_enabled = config.rate_limit.enabled,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Reject configurations that cannot serve
    fn validate(&self) -> Result<()> {
        // An empty host has nowhere to bind
        if self.server.host.is_empty() {
            anyhow::bail!("Invalid configuration: server.host is empty");
        }

        // Port 0 is an OS-assigned wildcard, reject it
        if self.server.port == 0 {
            anyhow::bail!("Invalid configuration: server.port is 0");
        }

        // The redis backend cannot start without a URL
        if self.cache.backend == CacheBackendType::Redis
            && self.cache.redis_url.as_ref().is_none_or(|u| u.is_empty())
        {
            anyhow::bail!(
                "Invalid configuration: the redis backend needs cache.redis_url"
            );
        }

        // A zero timeout would fail every cache operation
        if self.cache.op_timeout_ms == 0 {
            anyhow::bail!("Invalid configuration: cache.op_timeout_ms is 0");
        }

        if !self.cache.enabled {
            tracing::warn!("Caching is disabled, every request will hit the repository");
        }

        if self.rate_limit.enabled && self.rate_limit.api_rpm == 0 {
            tracing::warn!("rate_limit.api_rpm is 0, every request will be rejected");
        }

        Ok(())
    }
}

/// Whether the host means every interface
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}
