//! Cache administration endpoints
//!
//! Operational surface for the response cache: hit/miss counters for
//! the admin console and an explicit tenant-scoped purge. Purges never
//! take a raw key or pattern; the scope is a resource family (or the
//! whole tenant) so a console user cannot sweep another organization.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::tenant::TenantId;
use crate::api::types::{ApiError, ApiResponse};
use crate::data::cache::{CacheService, CacheStats, Invalidator, ResourceFamily};

/// Cache status for the admin console
#[derive(Debug, Serialize, ToSchema)]
pub struct CacheStatusDto {
    pub enabled: bool,
    pub healthy: bool,
    pub stats: CacheStats,
}

/// Request body for a cache purge
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PurgeRequest {
    /// Resource family to purge; omit to purge every family
    #[validate(length(min = 1, max = 40, message = "Family must be 1-40 characters"))]
    pub family: Option<String>,
}

/// Result of a cache purge
#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResultDto {
    /// What was swept: a family segment or `tenant`
    pub scope: String,
    /// Entries removed; an unreachable store reports zero
    pub removed: u64,
}

/// Shared state for cache admin endpoints
#[derive(Clone)]
pub struct AdminApiState {
    pub cache: Arc<CacheService>,
    pub invalidator: Invalidator,
}

/// Build cache admin routes
pub fn routes(cache: Arc<CacheService>, invalidator: Invalidator) -> Router<()> {
    Router::new()
        .route("/cache", get(cache_status))
        .route("/cache/purge", post(purge_cache))
        .with_state(AdminApiState { cache, invalidator })
}

/// Cache backend status and counters
#[utoipa::path(
    get,
    path = "/api/v1/admin/cache",
    tag = "admin",
    responses(
        (status = 200, description = "Cache backend status", body = CacheStatusDto)
    )
)]
pub async fn cache_status(State(state): State<AdminApiState>) -> Json<ApiResponse<CacheStatusDto>> {
    let healthy = state.cache.health_check().await.is_ok();

    ApiResponse::new(CacheStatusDto {
        enabled: state.cache.is_enabled(),
        healthy,
        stats: state.cache.stats(),
    })
}

/// Purge the requesting tenant's cached entries
#[utoipa::path(
    post,
    path = "/api/v1/admin/cache/purge",
    tag = "admin",
    request_body = PurgeRequest,
    responses(
        (status = 200, description = "Purge executed", body = PurgeResultDto),
        (status = 400, description = "Unknown resource family")
    )
)]
pub async fn purge_cache(
    State(state): State<AdminApiState>,
    Extension(org): Extension<TenantId>,
    ValidatedJson(body): ValidatedJson<PurgeRequest>,
) -> Result<Json<ApiResponse<PurgeResultDto>>, ApiError> {
    let result = match body.family.as_deref() {
        Some(raw) => {
            let family = ResourceFamily::parse(raw).ok_or_else(|| {
                ApiError::bad_request("UNKNOWN_FAMILY", format!("Unknown resource family: {raw}"))
            })?;
            let removed = state.invalidator.purge_family(org.as_str(), family).await;
            PurgeResultDto {
                scope: family.segment().to_string(),
                removed,
            }
        }
        None => {
            let removed = state.invalidator.purge_tenant(org.as_str()).await;
            PurgeResultDto {
                scope: "tenant".to_string(),
                removed,
            }
        }
    };

    tracing::info!(org = %org, scope = %result.scope, removed = result.removed, "Cache purged");
    Ok(ApiResponse::new(result))
}
