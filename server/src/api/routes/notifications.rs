//! Per-member notification endpoints
//!
//! Everything here is viewer-scoped: the list and the unread counter
//! belong to the acting member, so their cache keys carry the member
//! id and both go stale the moment the member's notifications mutate.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{ValidatedJson, ValidatedQuery};
use crate::api::invalidate::{MutationSweep, invalidate_on_write};
use crate::api::read_cache::{CachedView, read_through};
use crate::api::tenant::{TenantId, ViewerId, require_viewer};
use crate::api::types::{
    ApiError, ApiResponse, PaginatedResponse, default_limit, default_page, validate_limit,
    validate_page,
};
use crate::data::cache::{CacheService, Invalidator, ResourceFamily, ViewTier};
use crate::data::portal::{Notification, PortalRepository, ReadFilter};

/// Read-state filter accepted by the list endpoint; omitted means `all`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReadStateFilter {
    All,
    Unread,
    Read,
}

impl ReadStateFilter {
    fn to_filter(self) -> ReadFilter {
        match self {
            ReadStateFilter::All => ReadFilter::All,
            ReadStateFilter::Unread => ReadFilter::Unread,
            ReadStateFilter::Read => ReadFilter::Read,
        }
    }
}

/// Query params for listing notifications
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListNotificationsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    pub read: Option<ReadStateFilter>,
}

/// Request body for creating a notification
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 128, message = "Recipient ID must be 1-128 characters"))]
    pub recipient_id: String,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Body must be 1-2000 characters"))]
    pub body: String,
}

/// Unread tally for the acting member
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: u64,
}

/// How many notifications a mark-read pass flipped
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResult {
    pub updated: u64,
}

/// Shared state for notification endpoints
#[derive(Clone)]
pub struct NotificationsApiState {
    pub portal: Arc<dyn PortalRepository>,
}

/// Build notification routes with their cache layers
pub fn routes(
    portal: Arc<dyn PortalRepository>,
    cache: Arc<CacheService>,
    invalidator: Invalidator,
) -> Router<()> {
    let list = Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .layer(middleware::from_fn_with_state(
            CachedView::list(cache.clone(), ResourceFamily::Notifications),
            read_through,
        ));

    let unread = Router::new().route("/unread", get(unread_count)).layer(
        middleware::from_fn_with_state(
            CachedView::viewer(
                cache,
                ResourceFamily::Notifications,
                "unread",
                ViewTier::Counter,
            ),
            read_through,
        ),
    );

    let read_all = Router::new().route("/read-all", post(mark_all_read));

    list.merge(unread)
        .merge(read_all)
        .layer(middleware::from_fn_with_state(
            MutationSweep::new(invalidator, ResourceFamily::Notifications),
            invalidate_on_write,
        ))
        .with_state(NotificationsApiState { portal })
}

/// List the acting member's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("read" = Option<String>, Query, description = "all | unread | read (default all)")
    ),
    responses(
        (status = 200, description = "Page of notifications with pagination metadata"),
        (status = 401, description = "Missing member identity")
    )
)]
pub async fn list_notifications(
    State(state): State<NotificationsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedQuery(query): ValidatedQuery<ListNotificationsQuery>,
) -> Result<Json<PaginatedResponse<Notification>>, ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    let (rows, total) = state
        .portal
        .list_notifications(
            org.as_str(),
            viewer.as_str(),
            query.read.unwrap_or(ReadStateFilter::All).to_filter(),
            query.page,
            query.limit,
        )
        .await
        .map_err(ApiError::from_portal)?;

    Ok(PaginatedResponse::new(rows, query.page, query.limit, total))
}

/// Unread count for the acting member
#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread",
    tag = "notifications",
    responses(
        (status = 200, description = "Unread tally", body = UnreadCount),
        (status = 401, description = "Missing member identity")
    )
)]
pub async fn unread_count(
    State(state): State<NotificationsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
) -> Result<Json<ApiResponse<UnreadCount>>, ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    let unread = state
        .portal
        .unread_count(org.as_str(), viewer.as_str())
        .await
        .map_err(ApiError::from_portal)?;

    Ok(ApiResponse::new(UnreadCount { unread }))
}

/// Send a notification to one member
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 401, description = "Missing member identity")
    )
)]
pub async fn create_notification(
    State(state): State<NotificationsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedJson(body): ValidatedJson<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), ApiError> {
    require_viewer(viewer.as_deref())?;

    let notification = state
        .portal
        .create_notification(org.as_str(), &body.recipient_id, &body.title, &body.body)
        .await
        .map_err(ApiError::from_portal)?;

    Ok((StatusCode::CREATED, ApiResponse::new(notification)))
}

/// Mark all of the acting member's notifications as read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "Notifications marked read", body = MarkReadResult),
        (status = 401, description = "Missing member identity")
    )
)]
pub async fn mark_all_read(
    State(state): State<NotificationsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
) -> Result<Json<ApiResponse<MarkReadResult>>, ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    let updated = state
        .portal
        .mark_all_read(org.as_str(), viewer.as_str())
        .await
        .map_err(ApiError::from_portal)?;

    Ok(ApiResponse::new(MarkReadResult { updated }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::api::tenant::require_tenant;
    use crate::core::constants::{CACHE_STATUS_HEADER, TENANT_HEADER, VIEWER_HEADER};
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

    fn get_request(uri: &str, viewer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).header(TENANT_HEADER, "t1");
        if let Some(viewer) = viewer {
            builder = builder.header(VIEWER_HEADER, viewer);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_request(uri: &str, viewer: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(TENANT_HEADER, "t1")
            .header(VIEWER_HEADER, viewer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn disposition(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_viewer_required() {
        let app = app().await;

        for uri in ["/", "/unread"] {
            let response = app.clone().oneshot(get_request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "GET {uri}");
        }
    }

    #[tokio::test]
    async fn test_unread_flow_with_sweep() {
        let app = app().await;

        for i in 0..2 {
            let created = app
                .clone()
                .oneshot(post_request(
                    "/",
                    "staff-1",
                    serde_json::json!({
                        "recipient_id": "u1",
                        "title": format!("Update {i}"),
                        "body": "Something happened",
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(created.status(), StatusCode::CREATED);
        }

        let first = app
            .clone()
            .oneshot(get_request("/unread", Some("u1")))
            .await
            .unwrap();
        assert_eq!(disposition(&first), "MISS");
        assert_eq!(body_json(first).await["data"]["unread"], 2);
        settle().await;

        let second = app
            .clone()
            .oneshot(get_request("/unread", Some("u1")))
            .await
            .unwrap();
        assert_eq!(disposition(&second), "HIT");

        let marked = app
            .clone()
            .oneshot(post_request("/read-all", "u1", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(marked.status(), StatusCode::OK);
        assert_eq!(body_json(marked).await["data"]["updated"], 2);
        settle().await;

        let after = app
            .clone()
            .oneshot(get_request("/unread", Some("u1")))
            .await
            .unwrap();
        assert_eq!(disposition(&after), "MISS");
        assert_eq!(body_json(after).await["data"]["unread"], 0);
    }

    #[tokio::test]
    async fn test_list_scoped_to_viewer_and_filtered() {
        let app = app().await;

        let created = app
            .clone()
            .oneshot(post_request(
                "/",
                "staff-1",
                serde_json::json!({
                    "recipient_id": "u1",
                    "title": "Welcome",
                    "body": "Hello",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let mine = body_json(
            app.clone()
                .oneshot(get_request("/", Some("u1")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(mine["meta"]["total_items"], 1);

        let theirs = body_json(
            app.clone()
                .oneshot(get_request("/", Some("u2")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(theirs["meta"]["total_items"], 0);

        let unread_only = body_json(
            app.clone()
                .oneshot(get_request("/?read=unread", Some("u1")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(unread_only["meta"]["total_items"], 1);

        let read_only = body_json(
            app.clone()
                .oneshot(get_request("/?read=read", Some("u1")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(read_only["meta"]["total_items"], 0);
    }
}
