use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::CacheBackendType;
use super::constants::{
    ENV_CACHE_BACKEND, ENV_CACHE_ENABLED, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_OP_TIMEOUT_MS,
    ENV_CACHE_REDIS_URL, ENV_CONFIG, ENV_DEBUG, ENV_HOST, ENV_PORT, ENV_RATE_LIMIT_ADMIN_RPM,
    ENV_RATE_LIMIT_API_RPM, ENV_RATE_LIMIT_BYPASS_HEADER, ENV_RATE_LIMIT_ENABLED,
    ENV_RATE_LIMIT_MUTATION_RPM,
};

#[derive(Parser)]
#[command(name = "alumnet")]
#[command(version, about = "Alumni portal backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (verbose request logging)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    // Cache options
    /// Cache store to use, memory or redis
    #[arg(long, global = true, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Entry cap for the in-memory store
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Redis-compatible cache URL (Redis, Valkey, Dragonfly)
    #[arg(long, global = true, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    /// Per-operation cache timeout in milliseconds
    #[arg(long, global = true, env = ENV_CACHE_OP_TIMEOUT_MS)]
    pub cache_op_timeout_ms: Option<u64>,

    /// Turn response caching on or off
    #[arg(long, global = true, env = ENV_CACHE_ENABLED)]
    pub cache_enabled: Option<bool>,

    // Rate limit options
    /// Turn request rate limiting on or off
    #[arg(long, global = true, env = ENV_RATE_LIMIT_ENABLED)]
    pub rate_limit_enabled: Option<bool>,

    /// Read-traffic budget in requests per minute
    #[arg(long, global = true, env = ENV_RATE_LIMIT_API_RPM)]
    pub rate_limit_api_rpm: Option<u32>,

    /// Write-traffic budget in requests per minute
    #[arg(long, global = true, env = ENV_RATE_LIMIT_MUTATION_RPM)]
    pub rate_limit_mutation_rpm: Option<u32>,

    /// Admin-console budget in requests per minute
    #[arg(long, global = true, env = ENV_RATE_LIMIT_ADMIN_RPM)]
    pub rate_limit_admin_rpm: Option<u32>,

    /// Shared secret that exempts trusted callers from rate limits
    #[arg(long, global = true, env = ENV_RATE_LIMIT_BYPASS_HEADER)]
    pub rate_limit_bypass_header: Option<String>,
}

/// Value parser for the backend flag, case-insensitive
fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        _ => Err(format!("Unknown cache backend '{s}', expected 'memory' or 'redis'")),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run the portal server (assumed when no command is given)
    Start,
}

/// Flag values captured from the command line and environment
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_max_entries: Option<u64>,
    pub cache_redis_url: Option<String>,
    pub cache_op_timeout_ms: Option<u64>,
    pub cache_enabled: Option<bool>,
    pub rate_limit_enabled: Option<bool>,
    pub rate_limit_api_rpm: Option<u32>,
    pub rate_limit_mutation_rpm: Option<u32>,
    pub rate_limit_admin_rpm: Option<u32>,
    pub rate_limit_bypass_header: Option<String>,
}

/// Split parsed arguments into config overrides and the chosen command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        cache_backend: cli.cache_backend,
        cache_max_entries: cli.cache_max_entries,
        cache_redis_url: cli.cache_redis_url,
        cache_op_timeout_ms: cli.cache_op_timeout_ms,
        cache_enabled: cli.cache_enabled,
        rate_limit_enabled: cli.rate_limit_enabled,
        rate_limit_api_rpm: cli.rate_limit_api_rpm,
        rate_limit_mutation_rpm: cli.rate_limit_mutation_rpm,
        rate_limit_admin_rpm: cli.rate_limit_admin_rpm,
        rate_limit_bypass_header: cli.rate_limit_bypass_header,
    };
    (config, cli.command)
}
