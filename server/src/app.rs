//! Core application

use std::sync::Arc;

use anyhow::Result;

use crate::api::ApiServer;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::cache::{CacheService, Invalidator, RateLimiter};
use crate::data::portal::{MemoryPortal, PortalRepository};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub portal: Arc<dyn PortalRepository>,
    pub cache: Arc<CacheService>,
    pub invalidator: Invalidator,
    pub rate_limiter: Arc<RateLimiter>,
}

impl CoreApp {
    /// Parse the CLI and run the server until shutdown.
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            "{} starting",
            APP_NAME
        );

        let (cli_config, command) = cli::parse();
        tracing::trace!(?command, "CLI parsed");

        match command {
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let cache = Arc::new(
            CacheService::new(&config.cache)
                .await
                .map_err(|e| anyhow::anyhow!("Cache backend failed to start: {e}"))?,
        );

        tracing::debug!(
            backend = cache.backend_name(),
            enabled = cache.is_enabled(),
            "Cache ready"
        );

        let invalidator = Invalidator::new(cache.clone());
        let rate_limiter = Arc::new(RateLimiter::new(cache.clone()));
        let portal: Arc<dyn PortalRepository> = Arc::new(MemoryPortal::new());
        let shutdown = ShutdownService::new();

        Ok(Self {
            shutdown,
            config,
            portal,
            cache,
            invalidator,
            rate_limiter,
        })
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| format!("info,{APP_NAME_LOWER}=info"));

        tracing_subscriber::fmt()
            .compact()
            .with_target(false)
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Signal handlers go in before the listener binds
        app.shutdown.install_signal_handlers();

        ApiServer::new(app).start().await?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
