//! Shared API types
//!
//! Common types used across all API endpoints including the response
//! envelope, error handling, pagination and sorting.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidationError;

use crate::data::PortalError;

/// Parse an optional RFC 3339 timestamp parameter
pub fn parse_timestamp_param(s: &Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match s {
        Some(ts) => DateTime::parse_from_rfc3339(ts)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                ApiError::bad_request(
                    "INVALID_TIMESTAMP",
                    format!("Unparseable timestamp '{}', expected RFC 3339", ts),
                )
            }),
        None => Ok(None),
    }
}

/// Parse an optional `order` query parameter into an ascending flag
pub fn parse_order_param(s: &Option<String>, default_ascending: bool) -> Result<bool, ApiError> {
    match s.as_deref() {
        None => Ok(default_ascending),
        Some("asc") => Ok(true),
        Some("desc") => Ok(false),
        Some(other) => Err(ApiError::bad_request(
            "INVALID_ORDER",
            format!("Invalid order '{}'. Use 'asc' or 'desc'.", other),
        )),
    }
}

/// Page size ceiling for every paginated endpoint
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Page number ceiling, bounds worst-case pagination scans
pub const MAX_PAGE: u32 = 1000;
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;

/// Bounds check for the `page` query parameter
pub fn validate_page(page: u32) -> Result<(), ValidationError> {
    if page < 1 {
        return Err(ValidationError::new("page_min").with_message("page starts at 1".into()));
    }
    if page > MAX_PAGE {
        return Err(ValidationError::new("page_max")
            .with_message(format!("page cannot exceed {}", MAX_PAGE).into()));
    }
    Ok(())
}

/// Bounds check for the `limit` query parameter
pub fn validate_limit(limit: u32) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::new("limit_range")
            .with_message(format!("limit must fall in 1..={}", MAX_PAGE_LIMIT).into()));
    }
    Ok(())
}

/// Standard success envelope
///
/// Every successful response carries `"success": true` at the top level.
/// The read-through cache layer keys off this flag when deciding whether
/// a response body is safe to store.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error surface for every non-2xx response.
///
/// Renders as the `"success": false` envelope, which the cache layer
/// refuses to store.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    Conflict { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn from_portal(e: PortalError) -> Self {
        match e {
            PortalError::NotFound(what) => {
                Self::not_found("NOT_FOUND", format!("{} not found", what))
            }
            PortalError::Conflict(message) => Self::Conflict {
                code: "CONFLICT".to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", code, message)
            }
            Self::Forbidden { code, message } => {
                (StatusCode::FORBIDDEN, "forbidden", code, message)
            }
            Self::Conflict { code, message } => (StatusCode::CONFLICT, "conflict", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "success": false,
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

pub fn default_page() -> u32 {
    DEFAULT_PAGE
}

pub fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Page arithmetic attached to every list envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        Self {
            page,
            limit,
            total_items,
            total_pages: total_items.div_ceil(limit as u64),
        }
    }
}

/// Paginated success envelope
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, limit: u32, total_items: u64) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            meta: PaginationMeta::new(page, limit, total_items),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = ApiResponse::new(serde_json::json!({ "id": "p1" }));
        let rendered = serde_json::to_string(&body).unwrap();
        assert!(rendered.starts_with(r#"{"success":true"#));
    }

    #[test]
    fn test_paginated_envelope_meta() {
        let Json(body) = PaginatedResponse::new(vec![1, 2, 3], 2, 3, 10);
        assert!(body.success);
        assert_eq!(body.meta.total_pages, 4);
        assert_eq!(body.meta.page, 2);
    }

    #[test]
    fn test_parse_order_param() {
        assert!(parse_order_param(&None, true).unwrap());
        assert!(!parse_order_param(&Some("desc".to_string()), true).unwrap());
        assert!(parse_order_param(&Some("sideways".to_string()), true).is_err());
    }
}
