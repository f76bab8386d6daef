//! Path and validation extractors for API routes
//!
//! Entity ids and slugs are validated at the edge so handlers and the
//! cache key builders only ever see well-formed segments. Query and
//! body extractors run `validator` constraints and reject with the
//! standard error envelope.

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

/// Maximum length for entity ids in path segments
pub const MAX_ENTITY_ID_LEN: usize = 128;
/// Maximum length for slugs in path segments
pub const MAX_SLUG_LEN: usize = 160;

/// Raw path extractor for entity routes (internal use)
#[derive(Debug, Deserialize)]
struct EntityPathRaw {
    id: String,
}

/// Validated entity path extractor.
///
/// Extracts `{id}` from URL path parameters and rejects values that are
/// empty, oversized, or carry characters with structural meaning in
/// cache keys. Returns a 400 Bad Request on failure.
#[derive(Debug)]
pub struct EntityPath {
    pub id: String,
}

/// Validate an entity id path segment
pub fn is_valid_entity_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ENTITY_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Validate a slug path segment: lowercase alphanumeric and dashes
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl<S> FromRequestParts<S> for EntityPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<EntityPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_entity_id(&raw.id) {
            return Err(ValidationRejection::InvalidEntityId);
        }

        Ok(Self { id: raw.id })
    }
}

/// Raw path extractor for slug routes (internal use)
#[derive(Debug, Deserialize)]
struct SlugPathRaw {
    slug: String,
}

/// Validated slug path extractor.
///
/// Extracts `{slug}` from URL path parameters.
/// Returns a 400 Bad Request if validation fails.
#[derive(Debug)]
pub struct SlugPath {
    pub slug: String,
}

impl<S> FromRequestParts<S> for SlugPath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<SlugPathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_slug(&raw.slug) {
            return Err(ValidationRejection::InvalidSlug);
        }

        Ok(Self { slug: raw.slug })
    }
}

/// Validation rejection with structured error response
pub enum ValidationRejection {
    /// Failed to parse path parameters
    Path(PathRejection),
    /// Invalid entity id format
    InvalidEntityId,
    /// Invalid slug format
    InvalidSlug,
    /// Failed to parse query string
    Query(QueryRejection),
    /// Failed to parse JSON body
    Json(JsonRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            Self::Path(rejection) => ("PATH_PARSE_ERROR", rejection.body_text()),
            Self::InvalidEntityId => (
                "INVALID_ID",
                "Invalid id: must be 1-128 alphanumeric chars, dashes, underscores, or dots"
                    .to_string(),
            ),
            Self::InvalidSlug => (
                "INVALID_SLUG",
                "Invalid slug: must be 1-160 lowercase alphanumeric chars or dashes".to_string(),
            ),
            Self::Query(rejection) => ("QUERY_PARSE_ERROR", rejection.body_text()),
            Self::Json(rejection) => ("JSON_PARSE_ERROR", rejection.body_text()),
            Self::Validation(errors) => ("VALIDATION_ERROR", format_validation_errors(&errors)),
        };
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query extractor with automatic validation.
///
/// Deserializes query parameters and validates them using the `validator` crate.
/// Returns a `ValidationRejection` on parse or validation failure.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

/// JSON body extractor with automatic validation.
///
/// Deserializes JSON body and validates it using the `validator` crate.
/// Returns a `ValidationRejection` on parse or validation failure.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationRejection::Json)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_validation() {
        assert!(is_valid_entity_id("e-42"));
        assert!(is_valid_entity_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_entity_id(""));
        assert!(!is_valid_entity_id("a b"));
        assert!(!is_valid_entity_id("a:b"));
        assert!(!is_valid_entity_id(&"x".repeat(200)));
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("spring-reunion-2026"));
        assert!(!is_valid_slug("Spring-Reunion"));
        assert!(!is_valid_slug("has space"));
        assert!(!is_valid_slug(""));
    }
}
