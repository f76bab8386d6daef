//! Tenant resolution middleware
//!
//! Every portal route is scoped to an organization. The org id arrives in the
//! `x-org-id` header, is validated once here, and travels through the request
//! as a typed extension so handlers and the cache layers never re-parse it.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::types::ApiError;
use crate::core::constants::{TENANT_HEADER, VIEWER_HEADER};

/// Maximum accepted length for an org or user id header value.
const MAX_ID_LEN: usize = 128;

/// Organization id extracted from the `x-org-id` header.
///
/// Present as a request extension on all portal routes once
/// [`require_tenant`] has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Acting user id extracted from the `x-user-id` header.
///
/// Optional: routes that personalize responses (notifications) require it at
/// the handler level, everything else ignores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Viewer identity for routes that act on behalf of a member.
///
/// Auth lives upstream; this only rejects requests the gateway let
/// through without an identity header.
pub fn require_viewer(viewer: Option<&ViewerId>) -> Result<&ViewerId, ApiError> {
    viewer.ok_or_else(|| {
        ApiError::unauthorized(
            "MISSING_USER",
            format!("A valid {VIEWER_HEADER} header is required"),
        )
    })
}

/// Reject ids that are empty, oversized, or contain characters that cannot
/// appear in a cache key segment.
fn valid_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Tenant scoping middleware
///
/// Injects into request extensions:
/// - `TenantId` - always, or the request is rejected with 400
/// - `ViewerId` - only when the `x-user-id` header is present and valid
pub async fn require_tenant(mut request: Request, next: Next) -> Result<Response, ApiError> {
    // Build the owned ids before touching extensions; the header borrow
    // must end before `extensions_mut` takes the request mutably.
    let org = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| valid_id(v))
        .map(TenantId::new);

    let Some(org) = org else {
        return Err(ApiError::bad_request(
            "MISSING_ORG",
            format!("A valid {TENANT_HEADER} header is required"),
        ));
    };

    request.extensions_mut().insert(org);

    let viewer = request
        .headers()
        .get(VIEWER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| valid_id(v))
        .map(ViewerId::new);

    if let Some(viewer) = viewer {
        request.extensions_mut().insert(viewer);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use tower::ServiceExt;

    use super::*;

    async fn echo_org(Extension(org): Extension<TenantId>) -> String {
        org.as_str().to_string()
    }

    async fn echo_viewer(viewer: Option<Extension<ViewerId>>) -> String {
        viewer.map_or_else(|| "-".to_string(), |Extension(v)| v.as_str().to_string())
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", get(echo_org))
            .route("/whoami", get(echo_viewer))
            .layer(middleware::from_fn(require_tenant))
    }

    #[tokio::test]
    async fn test_missing_org_header_rejected() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_org_header_injected_as_extension() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/echo")
                    .header(TENANT_HEADER, "org-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"org-42");
    }

    #[tokio::test]
    async fn test_malformed_org_rejected() {
        for bad in ["", "   ", "org:42", "a".repeat(200).as_str()] {
            let response = app()
                .oneshot(
                    HttpRequest::builder()
                        .uri("/echo")
                        .header(TENANT_HEADER, bad)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "value: {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_viewer_header_injected_as_extension() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header(TENANT_HEADER, "org-42")
                    .header(VIEWER_HEADER, "user-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"user-7");
    }

    #[tokio::test]
    async fn test_absent_viewer_header_leaves_no_extension() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header(TENANT_HEADER, "org-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"-");
    }

    #[test]
    fn test_require_viewer() {
        let viewer = ViewerId::new("u1");
        assert_eq!(require_viewer(Some(&viewer)).unwrap().as_str(), "u1");
        assert!(require_viewer(None).is_err());
    }

    #[test]
    fn test_valid_id() {
        assert!(valid_id("org-1"));
        assert!(valid_id("user_9.test"));
        assert!(!valid_id(""));
        assert!(!valid_id("org 1"));
        assert!(!valid_id("org:1"));
        assert!(!valid_id("org*"));
    }
}
