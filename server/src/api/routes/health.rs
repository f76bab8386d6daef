//! Health check endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use crate::core::shutdown::ShutdownService;
use crate::data::cache::CacheService;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_backend: &'static str,
    pub cache_healthy: bool,
}

/// Shared state for the health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub cache: Arc<CacheService>,
    pub shutdown: ShutdownService,
}

/// Build health routes
pub fn routes(cache: Arc<CacheService>, shutdown: ShutdownService) -> Router<()> {
    Router::new()
        .route("/", get(health))
        .with_state(HealthState { cache, shutdown })
}

/// Health check endpoint.
///
/// A broken cache does not fail the check: the portal serves from the
/// repository without it. During shutdown the endpoint turns 503 so
/// load balancers drain the instance.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is shutting down")
    )
)]
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let cache_healthy = state.cache.health_check().await.is_ok();

    let (status_code, status) = if state.shutdown.is_triggered() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            cache_backend: state.cache.backend_name(),
            cache_healthy,
        }),
    )
}
