//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::response::Redirect;
use axum::routing::get;
use tokio::net::TcpListener;

use tower_http::compression::CompressionLayer;

use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::rate_limit::{
    KeyExtractor, RateLimitState, mutation_rate_limit_middleware, rate_limit_middleware,
};
use super::routes::{admin, directory, events, health, notifications, posts, tickets};
use super::tenant::require_tenant;
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::data::cache::RateLimitBucket;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);

        Self {
            app,
            allowed_origins,
        }
    }

    /// Serve until the shutdown signal fires and in-flight requests drain
    pub async fn start(self) -> Result<()> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();
        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(host.parse()?, port);

        let router = Self::build_router(&app, &allowed_origins);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "API server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(())
    }

    /// Assemble the full route tree with its middleware stack
    fn build_router(app: &CoreApp, allowed_origins: &AllowedOrigins) -> Router {
        let rate_limit_enabled = app.config.rate_limit.enabled;
        let api_rpm = app.config.rate_limit.api_rpm;
        let mutation_rpm = app.config.rate_limit.mutation_rpm;
        let admin_rpm = app.config.rate_limit.admin_rpm;
        let rate_limiter = app.rate_limiter.clone();
        let bypass_header = app.config.rate_limit.bypass_header.clone();

        // Helper to create rate limit state
        let make_rate_limit_state =
            |bucket: RateLimitBucket, key_extractor: KeyExtractor| RateLimitState {
                limiter: rate_limiter.clone(),
                bucket,
                key_extractor,
                bypass_header: bypass_header.clone(),
            };

        // Portal resource routers share one wrapping: tenant scoping
        // outermost, then the general API budget, then the tighter write
        // budget. The tenant layer runs first so the cache and sweep
        // layers below always see a resolved org.
        let portal_routes = |routes: Router| {
            let routes = if rate_limit_enabled {
                routes
                    .layer(axum::middleware::from_fn_with_state(
                        make_rate_limit_state(
                            RateLimitBucket::mutation(mutation_rpm),
                            KeyExtractor::IpAddress,
                        ),
                        mutation_rate_limit_middleware,
                    ))
                    .layer(axum::middleware::from_fn_with_state(
                        make_rate_limit_state(
                            RateLimitBucket::api(api_rpm),
                            KeyExtractor::IpAddress,
                        ),
                        rate_limit_middleware,
                    ))
            } else {
                routes
            };
            routes.layer(axum::middleware::from_fn(require_tenant))
        };

        let posts_routes = portal_routes(posts::routes(
            app.portal.clone(),
            app.cache.clone(),
            app.invalidator.clone(),
        ));
        let events_routes = portal_routes(events::routes(
            app.portal.clone(),
            app.cache.clone(),
            app.invalidator.clone(),
        ));
        let tickets_routes = portal_routes(tickets::routes(
            app.portal.clone(),
            app.cache.clone(),
            app.invalidator.clone(),
        ));
        let notifications_routes = portal_routes(notifications::routes(
            app.portal.clone(),
            app.cache.clone(),
            app.invalidator.clone(),
        ));
        let directory_routes = portal_routes(directory::routes(
            app.portal.clone(),
            app.cache.clone(),
            app.invalidator.clone(),
        ));

        // Admin console budget is keyed per organization so one org's
        // console cannot starve another's
        let admin_routes = admin::routes(app.cache.clone(), app.invalidator.clone());
        let admin_routes = if rate_limit_enabled {
            admin_routes.layer(axum::middleware::from_fn_with_state(
                make_rate_limit_state(RateLimitBucket::admin(admin_rpm), KeyExtractor::Tenant),
                rate_limit_middleware,
            ))
        } else {
            admin_routes
        };
        let admin_routes = admin_routes.layer(axum::middleware::from_fn(require_tenant));

        Router::new()
            .route("/", get(|| async { Redirect::temporary("/api/docs") }))
            .route("/api/openapi.json", get(openapi_json))
            .route("/api/docs", get(swagger_ui_html))
            .route("/api/docs/", get(swagger_ui_html))
            .nest(
                "/api/v1/health",
                health::routes(app.cache.clone(), app.shutdown.clone()),
            )
            .nest("/api/v1/posts", posts_routes)
            .nest("/api/v1/events", events_routes)
            .nest("/api/v1/tickets", tickets_routes)
            .nest("/api/v1/notifications", notifications_routes)
            .nest("/api/v1/directory", directory_routes)
            .nest("/api/v1/admin", admin_routes)
            .fallback(middleware::handle_404)
            .layer(CompressionLayer::new())
            .layer(middleware::cors(allowed_origins))
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
    }
}
