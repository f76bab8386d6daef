//! Community feed post endpoints
//!
//! The richest cached list surface: status, archive, free-text search,
//! tag, and date-range filters all key the list view. Mutations sweep
//! the posts family plus its linked feeds.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{EntityPath, ValidatedJson, ValidatedQuery};
use crate::api::invalidate::{MutationSweep, invalidate_on_write};
use crate::api::read_cache::{CachedView, read_through};
use crate::api::tenant::{TenantId, ViewerId, require_viewer};
use crate::api::types::{
    ApiError, ApiResponse, PaginatedResponse, default_page, parse_order_param,
    parse_timestamp_param, validate_limit, validate_page,
};
use crate::data::cache::{CacheService, Invalidator, ResourceFamily};
use crate::data::portal::{
    NewPost, PortalRepository, Post, PostListParams, PostPatch, PostStatus,
};

/// Status filter accepted by the list endpoint.
///
/// Omitting the parameter is the same as `published`, matching the
/// list key's placeholder so both spellings share one cache entry.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PostStatusFilter {
    All,
    Draft,
    Published,
}

impl PostStatusFilter {
    fn to_status(self) -> Option<PostStatus> {
        match self {
            PostStatusFilter::All => None,
            PostStatusFilter::Draft => Some(PostStatus::Draft),
            PostStatusFilter::Published => Some(PostStatus::Published),
        }
    }
}

fn default_post_limit() -> u32 {
    10
}

/// Query params for listing posts
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_post_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    pub status: Option<PostStatusFilter>,

    /// Include archived posts
    #[serde(default)]
    pub archived: bool,

    #[validate(length(max = 200, message = "Search must be at most 200 characters"))]
    pub search: Option<String>,

    /// Comma-separated tags; any listed tag qualifies a post
    #[validate(length(max = 200, message = "Tags must be at most 200 characters"))]
    pub tags: Option<String>,

    /// Only posts created at or after this timestamp (RFC 3339)
    pub datestart: Option<String>,

    /// Only posts created at or before this timestamp (RFC 3339)
    pub dateend: Option<String>,

    /// `asc` or `desc` by creation time (default `desc`)
    pub order: Option<String>,
}

impl ListPostsQuery {
    fn into_params(self) -> Result<PostListParams, ApiError> {
        Ok(PostListParams {
            status: self
                .status
                .unwrap_or(PostStatusFilter::Published)
                .to_status(),
            include_archived: self.archived,
            search: self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            tags: self
                .tags
                .map(|t| {
                    t.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            date_start: parse_timestamp_param(&self.datestart)?,
            date_end: parse_timestamp_param(&self.dateend)?,
            ascending: parse_order_param(&self.order, false)?,
            page: self.page,
            limit: self.limit,
        })
    }
}

/// Request body for creating a post
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 20000, message = "Body must be 1-20000 characters"))]
    pub body: String,

    #[validate(length(max = 10, message = "At most 10 tags per post"))]
    pub tags: Option<Vec<String>>,

    /// Defaults to `published`
    pub status: Option<PostStatus>,
}

/// Request body for updating a post
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 20000, message = "Body must be 1-20000 characters"))]
    pub body: Option<String>,

    #[validate(length(max = 10, message = "At most 10 tags per post"))]
    pub tags: Option<Vec<String>>,

    pub status: Option<PostStatus>,

    pub archived: Option<bool>,
}

/// Shared state for post endpoints
#[derive(Clone)]
pub struct PostsApiState {
    pub portal: Arc<dyn PortalRepository>,
}

/// Build post routes with their cache layers
pub fn routes(
    portal: Arc<dyn PortalRepository>,
    cache: Arc<CacheService>,
    invalidator: Invalidator,
) -> Router<()> {
    let list = Router::new()
        .route("/", get(list_posts).post(create_post))
        .layer(middleware::from_fn_with_state(
            CachedView::list(cache.clone(), ResourceFamily::Posts),
            read_through,
        ));

    let detail = Router::new()
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .layer(middleware::from_fn_with_state(
            CachedView::detail(cache, ResourceFamily::Posts),
            read_through,
        ));

    list.merge(detail)
        .layer(middleware::from_fn_with_state(
            MutationSweep::new(invalidator, ResourceFamily::Posts),
            invalidate_on_write,
        ))
        .with_state(PostsApiState { portal })
}

/// List posts with filters
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "posts",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("status" = Option<String>, Query, description = "all | draft | published (default published)"),
        ("archived" = Option<bool>, Query, description = "Include archived posts"),
        ("search" = Option<String>, Query, description = "Free-text search over title and body"),
        ("tags" = Option<String>, Query, description = "Comma-separated tag filter"),
        ("datestart" = Option<String>, Query, description = "Created at or after (RFC 3339)"),
        ("dateend" = Option<String>, Query, description = "Created at or before (RFC 3339)"),
        ("order" = Option<String>, Query, description = "asc | desc (default desc)")
    ),
    responses(
        (status = 200, description = "Page of posts with pagination metadata")
    )
)]
pub async fn list_posts(
    State(state): State<PostsApiState>,
    Extension(org): Extension<TenantId>,
    ValidatedQuery(query): ValidatedQuery<ListPostsQuery>,
) -> Result<Json<PaginatedResponse<Post>>, ApiError> {
    let (page, limit) = (query.page, query.limit);
    let params = query.into_params()?;

    let (posts, total) = state
        .portal
        .list_posts(org.as_str(), &params)
        .await
        .map_err(ApiError::from_portal)?;

    Ok(PaginatedResponse::new(posts, page, limit, total))
}

/// Get a single post
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post details", body = Post),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(
    State(state): State<PostsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let post = state
        .portal
        .get_post(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("POST_NOT_FOUND", format!("Post not found: {}", path.id))
        })?;

    Ok(ApiResponse::new(post))
}

/// Create a post (author is the acting member)
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 401, description = "Missing member identity")
    )
)]
pub async fn create_post(
    State(state): State<PostsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedJson(body): ValidatedJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    let post = state
        .portal
        .create_post(
            org.as_str(),
            NewPost {
                author_id: viewer.as_str().to_string(),
                title: body.title,
                body: body.body,
                tags: body.tags.unwrap_or_default(),
                status: body.status.unwrap_or(PostStatus::Published),
            },
        )
        .await
        .map_err(ApiError::from_portal)?;

    Ok((StatusCode::CREATED, ApiResponse::new(post)))
}

/// Update a post
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = String, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = Post),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    State(state): State<PostsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
    ValidatedJson(body): ValidatedJson<UpdatePostRequest>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let patch = PostPatch {
        title: body.title,
        body: body.body,
        tags: body.tags,
        status: body.status,
        archived: body.archived,
    };

    let post = state
        .portal
        .update_post(org.as_str(), &path.id, patch)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("POST_NOT_FOUND", format!("Post not found: {}", path.id))
        })?;

    Ok(ApiResponse::new(post))
}

/// Delete a post
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(
    State(state): State<PostsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .portal
        .delete_post(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?;

    if !deleted {
        return Err(ApiError::not_found(
            "POST_NOT_FOUND",
            format!("Post not found: {}", path.id),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
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

    fn create_request(org: &str, viewer: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header(TENANT_HEADER, org)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(viewer) = viewer {
            builder = builder.header(VIEWER_HEADER, viewer);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(org: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(TENANT_HEADER, org)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Spawned write-backs and sweeps land within this window
    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_create_requires_viewer() {
        let response = app()
            .await
            .oneshot(create_request(
                "t1",
                None,
                serde_json::json!({ "title": "Hi", "body": "First" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let app = app().await;

        let created = app
            .clone()
            .oneshot(create_request(
                "t1",
                Some("u1"),
                serde_json::json!({ "title": "Reunion recap", "body": "It was great" }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = body_json(created).await;
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["author_id"], "u1");
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let fetched = app
            .clone()
            .oneshot(get_request("t1", &format!("/{id}")))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let fetched = body_json(fetched).await;
        assert_eq!(fetched["data"]["title"], "Reunion recap");

        let deleted = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/{id}"))
                    .header(TENANT_HEADER, "t1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
        settle().await;

        let missing = app
            .clone()
            .oneshot(get_request("t1", &format!("/{id}")))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_rejects_malformed_filters() {
        let app = app().await;

        let bad_order = app
            .clone()
            .oneshot(get_request("t1", "/?order=sideways"))
            .await
            .unwrap();
        assert_eq!(bad_order.status(), StatusCode::BAD_REQUEST);

        let bad_page = app
            .clone()
            .oneshot(get_request("t1", "/?page=0"))
            .await
            .unwrap();
        assert_eq!(bad_page.status(), StatusCode::BAD_REQUEST);

        let bad_date = app
            .clone()
            .oneshot(get_request("t1", "/?datestart=yesterday"))
            .await
            .unwrap();
        assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_default_excludes_drafts() {
        let app = app().await;

        for (title, status) in [("Live", "published"), ("WIP", "draft")] {
            let response = app
                .clone()
                .oneshot(create_request(
                    "t1",
                    Some("u1"),
                    serde_json::json!({ "title": title, "body": "b", "status": status }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let listed = body_json(app.clone().oneshot(get_request("t1", "/")).await.unwrap()).await;
        assert_eq!(listed["meta"]["total_items"], 1);
        assert_eq!(listed["data"][0]["title"], "Live");

        let all = body_json(
            app.clone()
                .oneshot(get_request("t1", "/?status=all"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(all["meta"]["total_items"], 2);
    }
}
