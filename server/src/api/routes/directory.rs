//! Alumni directory endpoints
//!
//! The directory is the tenant-wide member list. A member owns exactly
//! one profile, keyed by their member id: creating claims it, updating
//! is restricted to the owner.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{EntityPath, ValidatedJson, ValidatedQuery};
use crate::api::invalidate::{MutationSweep, invalidate_on_write};
use crate::api::read_cache::{CachedView, read_through};
use crate::api::tenant::{TenantId, ViewerId, require_viewer};
use crate::api::types::{
    ApiError, ApiResponse, PaginatedResponse, default_limit, default_page, parse_order_param,
    validate_limit, validate_page,
};
use crate::data::cache::{CacheService, Invalidator, ResourceFamily};
use crate::data::portal::{AlumniProfile, DirectoryListParams, PortalRepository, ProfilePatch};

/// Query params for browsing the directory
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListDirectoryQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    /// Restrict to one graduation year
    #[validate(range(min = 1900, max = 2100, message = "Graduation year must be 1900-2100"))]
    pub gradyear: Option<i32>,

    #[validate(length(max = 200, message = "Search must be at most 200 characters"))]
    pub search: Option<String>,

    /// `asc` or `desc` by name (default `asc`)
    pub order: Option<String>,
}

/// Request body for claiming a profile
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(range(min = 1900, max = 2100, message = "Graduation year must be 1900-2100"))]
    pub grad_year: i32,

    #[validate(length(max = 120, message = "Department must be at most 120 characters"))]
    #[serde(default)]
    pub department: String,

    #[validate(length(max = 120, message = "City must be at most 120 characters"))]
    #[serde(default)]
    pub city: String,

    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    #[serde(default)]
    pub bio: String,
}

/// Request body for updating a profile
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 120, message = "Department must be at most 120 characters"))]
    pub department: Option<String>,

    #[validate(length(max = 120, message = "City must be at most 120 characters"))]
    pub city: Option<String>,

    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,
}

/// Shared state for directory endpoints
#[derive(Clone)]
pub struct DirectoryApiState {
    pub portal: Arc<dyn PortalRepository>,
}

/// Build directory routes with their cache layers
pub fn routes(
    portal: Arc<dyn PortalRepository>,
    cache: Arc<CacheService>,
    invalidator: Invalidator,
) -> Router<()> {
    let list = Router::new()
        .route("/", get(list_directory).post(create_profile))
        .layer(middleware::from_fn_with_state(
            CachedView::list(cache.clone(), ResourceFamily::Users),
            read_through,
        ));

    let detail = Router::new()
        .route("/{id}", get(get_profile).put(update_profile))
        .layer(middleware::from_fn_with_state(
            CachedView::detail(cache, ResourceFamily::Users),
            read_through,
        ));

    list.merge(detail)
        .layer(middleware::from_fn_with_state(
            MutationSweep::new(invalidator, ResourceFamily::Users),
            invalidate_on_write,
        ))
        .with_state(DirectoryApiState { portal })
}

/// Browse the alumni directory
#[utoipa::path(
    get,
    path = "/api/v1/directory",
    tag = "directory",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("gradyear" = Option<i32>, Query, description = "Restrict to one graduation year"),
        ("search" = Option<String>, Query, description = "Free-text search over name, email, department, city"),
        ("order" = Option<String>, Query, description = "asc | desc by name (default asc)")
    ),
    responses(
        (status = 200, description = "Page of profiles with pagination metadata")
    )
)]
pub async fn list_directory(
    State(state): State<DirectoryApiState>,
    Extension(org): Extension<TenantId>,
    ValidatedQuery(query): ValidatedQuery<ListDirectoryQuery>,
) -> Result<Json<PaginatedResponse<AlumniProfile>>, ApiError> {
    let params = DirectoryListParams {
        grad_year: query.gradyear,
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        ascending: parse_order_param(&query.order, true)?,
        page: query.page,
        limit: query.limit,
    };

    let (profiles, total) = state
        .portal
        .list_profiles(org.as_str(), &params)
        .await
        .map_err(ApiError::from_portal)?;

    Ok(PaginatedResponse::new(profiles, query.page, query.limit, total))
}

/// Get one member's profile
#[utoipa::path(
    get,
    path = "/api/v1/directory/{id}",
    tag = "directory",
    params(("id" = String, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Profile details", body = AlumniProfile),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn get_profile(
    State(state): State<DirectoryApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
) -> Result<Json<ApiResponse<AlumniProfile>>, ApiError> {
    let profile = state
        .portal
        .get_profile(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found(
                "PROFILE_NOT_FOUND",
                format!("Profile not found: {}", path.id),
            )
        })?;

    Ok(ApiResponse::new(profile))
}

/// Claim the acting member's directory profile
#[utoipa::path(
    post,
    path = "/api/v1/directory",
    tag = "directory",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = AlumniProfile),
        (status = 401, description = "Missing member identity"),
        (status = 409, description = "Profile already exists")
    )
)]
pub async fn create_profile(
    State(state): State<DirectoryApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedJson(body): ValidatedJson<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AlumniProfile>>), ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    if state
        .portal
        .get_profile(org.as_str(), viewer.as_str())
        .await
        .map_err(ApiError::from_portal)?
        .is_some()
    {
        return Err(ApiError::conflict(
            "PROFILE_EXISTS",
            "This member already has a directory profile",
        ));
    }

    let now = Utc::now();
    let profile = state
        .portal
        .create_profile(
            org.as_str(),
            AlumniProfile {
                id: viewer.as_str().to_string(),
                org_id: org.as_str().to_string(),
                name: body.name,
                email: body.email,
                grad_year: body.grad_year,
                department: body.department,
                city: body.city,
                bio: body.bio,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(ApiError::from_portal)?;

    Ok((StatusCode::CREATED, ApiResponse::new(profile)))
}

/// Update a profile; only its owner may
#[utoipa::path(
    put,
    path = "/api/v1/directory/{id}",
    tag = "directory",
    params(("id" = String, Path, description = "Member ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AlumniProfile),
        (status = 401, description = "Missing member identity"),
        (status = 403, description = "Not the profile owner"),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn update_profile(
    State(state): State<DirectoryApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    path: EntityPath,
    ValidatedJson(body): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<AlumniProfile>>, ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;
    if viewer.as_str() != path.id {
        return Err(ApiError::forbidden(
            "NOT_PROFILE_OWNER",
            "Only the profile owner may update it",
        ));
    }

    let patch = ProfilePatch {
        name: body.name,
        department: body.department,
        city: body.city,
        bio: body.bio,
    };

    let profile = state
        .portal
        .update_profile(org.as_str(), &path.id, patch)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found(
                "PROFILE_NOT_FOUND",
                format!("Profile not found: {}", path.id),
            )
        })?;

    Ok(ApiResponse::new(profile))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::api::tenant::require_tenant;
    use crate::core::constants::{TENANT_HEADER, VIEWER_HEADER};
    use crate::data::cache::test_support::memory_service;
    use crate::data::portal::MemoryPortal;

    async fn app() -> Router {
        let cache = Arc::new(memory_service().await);
        routes(
            Arc::new(MemoryPortal::new()),
            cache.clone(),
            Invalidator::new(cache),
        )
        .layer(middleware::from_fn(require_tenant))
    }

    fn profile_body(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "email": "ada@example.edu",
            "grad_year": 2015,
            "department": "Physics",
            "city": "Pune",
        })
    }

    fn create_request(viewer: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header(TENANT_HEADER, "t1")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(viewer) = viewer {
            builder = builder.header(VIEWER_HEADER, viewer);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn update_request(viewer: &str, id: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/{id}"))
            .header(TENANT_HEADER, "t1")
            .header(VIEWER_HEADER, viewer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(TENANT_HEADER, "t1")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_claim_requires_viewer_and_rejects_duplicates() {
        let app = app().await;

        let anonymous = app
            .clone()
            .oneshot(create_request(None, profile_body("Ada")))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let first = app
            .clone()
            .oneshot(create_request(Some("u1"), profile_body("Ada")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(body_json(first).await["data"]["id"], "u1");

        let again = app
            .clone()
            .oneshot(create_request(Some("u1"), profile_body("Ada")))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_only_owner_updates() {
        let app = app().await;

        let created = app
            .clone()
            .oneshot(create_request(Some("u1"), profile_body("Ada")))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let intruder = app
            .clone()
            .oneshot(update_request(
                "u2",
                "u1",
                serde_json::json!({ "city": "Mumbai" }),
            ))
            .await
            .unwrap();
        assert_eq!(intruder.status(), StatusCode::FORBIDDEN);

        let owner = app
            .clone()
            .oneshot(update_request(
                "u1",
                "u1",
                serde_json::json!({ "city": "Mumbai" }),
            ))
            .await
            .unwrap();
        assert_eq!(owner.status(), StatusCode::OK);
        assert_eq!(body_json(owner).await["data"]["city"], "Mumbai");
    }

    #[tokio::test]
    async fn test_search_and_gradyear_filters() {
        let app = app().await;

        for (viewer, name, year) in [("u1", "Ada Alum", 2015), ("u2", "Grace Grad", 2018)] {
            let mut body = profile_body(name);
            body["grad_year"] = serde_json::json!(year);
            let response = app
                .clone()
                .oneshot(create_request(Some(viewer), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let searched = body_json(
            app.clone()
                .oneshot(get_request("/?search=ada"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(searched["meta"]["total_items"], 1);
        assert_eq!(searched["data"][0]["name"], "Ada Alum");

        let by_year = body_json(
            app.clone()
                .oneshot(get_request("/?gradyear=2018"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(by_year["meta"]["total_items"], 1);
        assert_eq!(by_year["data"][0]["name"], "Grace Grad");

        let bad_year = app
            .clone()
            .oneshot(get_request("/?gradyear=1700"))
            .await
            .unwrap();
        assert_eq!(bad_year.status(), StatusCode::BAD_REQUEST);
    }
}
