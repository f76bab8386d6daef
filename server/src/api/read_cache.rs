//! Read-through response cache
//!
//! One middleware serves every cacheable GET route. Each route declares
//! a [`CachedView`] naming its resource family and view shape; the
//! policy tables supply the filter dimensions and TTL. On a hit the
//! stored envelope is returned without touching the handler. On a miss
//! the handler runs, the body is buffered, and a successful envelope is
//! written back asynchronously while the response goes out.
//!
//! Every response carries an `x-cache` header: `HIT`, `MISS`, or
//! `BYPASS` when caching is off or the request cannot be keyed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::RequestExt;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{Query, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::tenant::{TenantId, ViewerId};
use super::types::ApiError;
use crate::core::constants::{CACHE_STATUS_HEADER, MAX_CACHEABLE_BODY_BYTES};
use crate::data::cache::{
    CacheKey, CacheService, ListKey, ResourceFamily, ResourcePolicy, ViewTier, multi_value,
};

const HIT: &str = "HIT";
const MISS: &str = "MISS";
const BYPASS: &str = "BYPASS";

/// How a route's cache key is derived from the request
#[derive(Debug, Clone, Copy)]
enum ViewKind {
    /// Filter dimensions from the query string, per the family policy
    List,
    /// Entity id from the trailing path segment
    Detail,
    /// Slug from the trailing path segment
    Slug,
    /// One aggregate per family per tenant
    Stats,
    /// Named per-viewer view, keyed by the acting member
    Viewer(&'static str),
}

/// Per-route cache declaration, passed to [`read_through`] as state.
#[derive(Clone)]
pub struct CachedView {
    cache: Arc<CacheService>,
    family: ResourceFamily,
    kind: ViewKind,
    tier: ViewTier,
}

impl CachedView {
    pub fn list(cache: Arc<CacheService>, family: ResourceFamily) -> Self {
        Self {
            cache,
            family,
            kind: ViewKind::List,
            tier: ViewTier::List,
        }
    }

    pub fn detail(cache: Arc<CacheService>, family: ResourceFamily) -> Self {
        Self {
            cache,
            family,
            kind: ViewKind::Detail,
            tier: ViewTier::Detail,
        }
    }

    pub fn slug(cache: Arc<CacheService>, family: ResourceFamily) -> Self {
        debug_assert!(
            family.policy().has_slug,
            "{family} declares no slug lookup view"
        );
        Self {
            cache,
            family,
            kind: ViewKind::Slug,
            tier: ViewTier::Detail,
        }
    }

    pub fn stats(cache: Arc<CacheService>, family: ResourceFamily) -> Self {
        Self {
            cache,
            family,
            kind: ViewKind::Stats,
            tier: ViewTier::Stats,
        }
    }

    pub fn viewer(
        cache: Arc<CacheService>,
        family: ResourceFamily,
        view: &'static str,
        tier: ViewTier,
    ) -> Self {
        Self {
            cache,
            family,
            kind: ViewKind::Viewer(view),
            tier,
        }
    }

    /// Derive the cache key for this request, or `None` when the
    /// request cannot be keyed (malformed query, missing viewer).
    async fn key_for(&self, tenant: &TenantId, request: &mut Request) -> Option<String> {
        let segment = self.family.segment();
        match self.kind {
            ViewKind::List => {
                let Query(params) = request
                    .extract_parts::<Query<HashMap<String, String>>>()
                    .await
                    .ok()?;
                let viewer = request.extensions().get::<ViewerId>().cloned();
                Some(list_key(
                    tenant.as_str(),
                    self.family.policy(),
                    &params,
                    viewer.as_ref(),
                ))
            }
            ViewKind::Detail => {
                let id = last_segment(request.uri().path())?;
                Some(CacheKey::detail(tenant.as_str(), segment, id))
            }
            ViewKind::Slug => {
                let slug = last_segment(request.uri().path())?;
                Some(CacheKey::slug(tenant.as_str(), segment, slug))
            }
            ViewKind::Stats => Some(CacheKey::stats(tenant.as_str(), segment)),
            ViewKind::Viewer(view) => {
                let viewer = request.extensions().get::<ViewerId>()?;
                Some(CacheKey::viewer_view(
                    tenant.as_str(),
                    segment,
                    view,
                    viewer.as_str(),
                ))
            }
        }
    }
}

/// Read-through middleware over one [`CachedView`].
///
/// Only `200` responses whose body is a `success: true` envelope within
/// the size cap are stored. The write-back is spawned so the response
/// never waits on the store; a write that loses the race against an
/// invalidation is bounded by the entry TTL.
pub async fn read_through(
    State(view): State<CachedView>,
    mut request: Request,
    next: Next,
) -> Response {
    // Mutations on the same router pass through untouched
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    if !view.cache.is_enabled() {
        return mark(next.run(request).await, BYPASS);
    }

    let Some(tenant) = request.extensions().get::<TenantId>().cloned() else {
        tracing::debug!(path = %request.uri().path(), "No tenant context, bypassing cache");
        return mark(next.run(request).await, BYPASS);
    };

    let Some(key) = view.key_for(&tenant, &mut request).await else {
        tracing::debug!(path = %request.uri().path(), "Request cannot be keyed, bypassing cache");
        return mark(next.run(request).await, BYPASS);
    };

    if let Some(bytes) = view.cache.get_bytes(&key).await {
        tracing::trace!(key = %key, "Cache hit");
        return hit_response(bytes);
    }

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    if parts.status != StatusCode::OK {
        set_disposition(&mut parts.headers, MISS);
        return Response::from_parts(parts, body);
    }

    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Failed to buffer response body");
            return ApiError::internal("Failed to buffer response").into_response();
        }
    };

    if bytes.len() <= MAX_CACHEABLE_BODY_BYTES && is_success_envelope(&bytes) {
        let ttl = view.family.policy().ttl_for(view.tier);
        let cache = view.cache.clone();
        let store_key = key.clone();
        let value = bytes.to_vec();
        tokio::spawn(async move {
            cache.set_bytes(&store_key, value, Some(ttl)).await;
        });
    }

    set_disposition(&mut parts.headers, MISS);
    Response::from_parts(parts, Body::from(bytes))
}

/// Build one list key from the family's declared dimensions.
///
/// Every declared dimension appears in the key: present parameters
/// contribute their value, absent ones their placeholder. The viewer
/// dimension comes from the request identity, never the query string,
/// and set-valued dimensions are canonicalized before keying.
fn list_key(
    tenant: &str,
    policy: &ResourcePolicy,
    params: &HashMap<String, String>,
    viewer: Option<&ViewerId>,
) -> String {
    let mut key = ListKey::new(tenant, policy.family.segment());
    for dim in policy.dims {
        let raw = params
            .get(dim.name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());
        let value = match dim.name {
            "user" => viewer.map(|v| v.as_str().to_string()),
            "tags" => raw
                .map(|r| multi_value(&r.split(',').map(str::to_string).collect::<Vec<_>>()))
                .filter(|v| !v.is_empty()),
            _ => raw.map(str::to_string),
        };
        key = match value {
            Some(v) => key.dim(dim.name, &v),
            None => key.dim(dim.name, dim.placeholder),
        };
    }
    key.build()
}

pub(super) fn last_segment(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// A response is cacheable only when it is the standard success
/// envelope. Errors serialized with `200` by mistake, or foreign body
/// shapes, are never stored.
fn is_success_envelope(bytes: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => value
            .get("success")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        Err(_) => false,
    }
}

fn set_disposition(headers: &mut axum::http::HeaderMap, disposition: &'static str) {
    headers.insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static(disposition),
    );
}

fn mark(mut response: Response, disposition: &'static str) -> Response {
    set_disposition(response.headers_mut(), disposition);
    response
}

fn hit_response(bytes: Vec<u8>) -> Response {
    let mut response = Bytes::from(bytes).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    set_disposition(response.headers_mut(), HIT);
    response
}
