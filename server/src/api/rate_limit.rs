//! Rate limiting middleware for API routes

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::tenant::TenantId;
use crate::data::cache::{RateLimitBucket, RateLimitResult, RateLimiter};

/// Header carrying the bypass secret for internal callers
const BYPASS_HEADER: &str = "x-ratelimit-bypass";

/// Rate limit middleware state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub bucket: RateLimitBucket,
    pub key_extractor: KeyExtractor,
    pub bypass_header: Option<String>,
}

/// How to extract the rate limit key from a request
#[derive(Clone, Copy)]
pub enum KeyExtractor {
    /// Per-IP budget (member browsing and write traffic)
    IpAddress,
    /// Per-organization budget (admin console), falling back to the
    /// client IP when the request carries no tenant
    Tenant,
}

/// Rate limit exceeded response
pub struct RateLimitExceeded(RateLimitResult);

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let r = &self.0;
        let body = json!({
            "success": false,
            "error": "too_many_requests",
            "code": "RATE_LIMITED",
            "message": "Rate limit exceeded, slow down",
        });

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        add_rate_limit_headers(&mut response, r);
        if let Ok(v) = HeaderValue::from_str(&r.retry_after.unwrap_or(60).to_string()) {
            response.headers_mut().insert(axum::http::header::RETRY_AFTER, v);
        }
        response
    }
}

/// Add rate limit headers to response
fn add_rate_limit_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&result.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

/// Client IP: first X-Forwarded-For entry for proxied requests, else
/// the peer address when the listener recorded one.
fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        })
}

/// Extract rate limit key based on configuration
fn extract_key(request: &Request, key_extractor: KeyExtractor) -> String {
    match key_extractor {
        KeyExtractor::IpAddress => client_ip(request),
        KeyExtractor::Tenant => request
            .extensions()
            .get::<TenantId>()
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| client_ip(request)),
    }
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    // Check bypass header (for internal services)
    if let Some(ref bypass_secret) = state.bypass_header
        && let Some(header_val) = request.headers().get(BYPASS_HEADER)
        && header_val.to_str().ok() == Some(bypass_secret.as_str())
    {
        tracing::trace!("Rate limit bypassed via header");
        return Ok(next.run(request).await);
    }

    let key = extract_key(&request, state.key_extractor);
    let result = state.limiter.check(&state.bucket, &key).await;

    if !result.allowed {
        tracing::debug!(
            bucket = state.bucket.name,
            %key,
            "Rate limit exceeded"
        );
        return Err(RateLimitExceeded(result));
    }

    // Add rate limit headers to successful response
    let mut response = next.run(request).await;
    add_rate_limit_headers(&mut response, &result);
    Ok(response)
}

/// Rate limiting middleware that only meters writes
///
/// Reads pass through untouched so list polling never drains the
/// tighter mutation budget.
pub async fn mutation_rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return Ok(next.run(request).await);
    }
    rate_limit_middleware(State(state), request, next).await
}
