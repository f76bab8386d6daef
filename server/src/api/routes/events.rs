//! Event endpoints
//!
//! Events exercise every view shape: filtered lists, id and slug
//! details, a tenant aggregate, and the live check-in tally. Check-in
//! routes sit outside the family sweep; a check-in only drops the tally
//! and stats keys, leaving lists and details warm.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::api::extractors::{EntityPath, SlugPath, ValidatedJson, ValidatedQuery, is_valid_slug};
use crate::api::invalidate::{MutationSweep, invalidate_on_write};
use crate::api::read_cache::{CachedView, read_through};
use crate::api::tenant::{TenantId, ViewerId, require_viewer};
use crate::api::types::{
    ApiError, ApiResponse, PaginatedResponse, default_page, parse_order_param,
    parse_timestamp_param, validate_limit, validate_page,
};
use crate::data::cache::{CacheKey, CacheService, Invalidator, ResourceFamily, ViewTier};
use crate::data::portal::{
    Event, EventListParams, EventPatch, EventStats, EventStatus, NewEvent, PortalRepository,
};

/// Status filter accepted by the list endpoint.
///
/// Omitting the parameter is the same as `upcoming`, matching the list
/// key's placeholder so both spellings share one cache entry.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatusFilter {
    All,
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatusFilter {
    fn to_status(self) -> Option<EventStatus> {
        match self {
            EventStatusFilter::All => None,
            EventStatusFilter::Upcoming => Some(EventStatus::Upcoming),
            EventStatusFilter::Ongoing => Some(EventStatus::Ongoing),
            EventStatusFilter::Completed => Some(EventStatus::Completed),
            EventStatusFilter::Cancelled => Some(EventStatus::Cancelled),
        }
    }
}

fn default_event_limit() -> u32 {
    10
}

/// Query params for listing events
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListEventsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_event_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    pub status: Option<EventStatusFilter>,

    #[validate(length(max = 200, message = "Search must be at most 200 characters"))]
    pub search: Option<String>,

    /// Only events starting at or after this timestamp (RFC 3339)
    pub datestart: Option<String>,

    /// Only events starting at or before this timestamp (RFC 3339)
    pub dateend: Option<String>,

    /// `asc` or `desc` by start time (default `asc`)
    pub order: Option<String>,
}

fn validate_slug_format(slug: &str) -> Result<(), ValidationError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("slug_format")
            .with_message("Slug must be lowercase letters, digits, and dashes".into()))
    }
}

/// Request body for creating an event
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    #[validate(custom(function = "validate_slug_format"))]
    pub slug: String,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 20000, message = "Description must be at most 20000 characters"))]
    #[serde(default)]
    pub description: String,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    #[serde(default)]
    pub location: String,

    #[validate(range(min = 1, max = 100_000, message = "Capacity must be 1-100000"))]
    pub capacity: u32,

    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub ends_at: chrono::DateTime<chrono::Utc>,
}

/// Request body for updating an event
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 20000, message = "Description must be at most 20000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    pub status: Option<EventStatus>,

    #[validate(range(min = 1, max = 100_000, message = "Capacity must be 1-100000"))]
    pub capacity: Option<u32>,
}

/// Live check-in tally for one event
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckinTally {
    pub event_id: String,
    pub total: u64,
}

/// Shared state for event endpoints
#[derive(Clone)]
pub struct EventsApiState {
    pub portal: Arc<dyn PortalRepository>,
    pub cache: Arc<CacheService>,
}

/// Build event routes with their cache layers.
///
/// Check-in routes are merged after the sweep layer: a check-in must
/// not flush the family's lists and details.
pub fn routes(
    portal: Arc<dyn PortalRepository>,
    cache: Arc<CacheService>,
    invalidator: Invalidator,
) -> Router<()> {
    let state = EventsApiState {
        portal,
        cache: cache.clone(),
    };

    let list = Router::new()
        .route("/", get(list_events).post(create_event))
        .layer(middleware::from_fn_with_state(
            CachedView::list(cache.clone(), ResourceFamily::Events),
            read_through,
        ));

    let detail = Router::new()
        .route("/{id}", get(get_event).put(update_event))
        .layer(middleware::from_fn_with_state(
            CachedView::detail(cache.clone(), ResourceFamily::Events),
            read_through,
        ));

    let slug = Router::new().route("/slug/{slug}", get(get_event_by_slug)).layer(
        middleware::from_fn_with_state(
            CachedView::slug(cache.clone(), ResourceFamily::Events),
            read_through,
        ),
    );

    let stats = Router::new().route("/stats", get(get_event_stats)).layer(
        middleware::from_fn_with_state(
            CachedView::stats(cache, ResourceFamily::Events),
            read_through,
        ),
    );

    let checkin = Router::new()
        .route("/{id}/checkin", post(check_in))
        .route("/{id}/checkins", get(checkin_tally));

    list.merge(detail)
        .merge(slug)
        .merge(stats)
        .layer(middleware::from_fn_with_state(
            MutationSweep::new(invalidator, ResourceFamily::Events),
            invalidate_on_write,
        ))
        .merge(checkin)
        .with_state(state)
}

/// List events with filters
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "events",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("status" = Option<String>, Query, description = "all | upcoming | ongoing | completed | cancelled (default upcoming)"),
        ("search" = Option<String>, Query, description = "Free-text search over title and description"),
        ("datestart" = Option<String>, Query, description = "Starting at or after (RFC 3339)"),
        ("dateend" = Option<String>, Query, description = "Starting at or before (RFC 3339)"),
        ("order" = Option<String>, Query, description = "asc | desc (default asc)")
    ),
    responses(
        (status = 200, description = "Page of events with pagination metadata")
    )
)]
pub async fn list_events(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    ValidatedQuery(query): ValidatedQuery<ListEventsQuery>,
) -> Result<Json<PaginatedResponse<Event>>, ApiError> {
    let params = EventListParams {
        status: query
            .status
            .unwrap_or(EventStatusFilter::Upcoming)
            .to_status(),
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        date_start: parse_timestamp_param(&query.datestart)?,
        date_end: parse_timestamp_param(&query.dateend)?,
        ascending: parse_order_param(&query.order, true)?,
        page: query.page,
        limit: query.limit,
    };

    let (events, total) = state
        .portal
        .list_events(org.as_str(), &params)
        .await
        .map_err(ApiError::from_portal)?;

    Ok(PaginatedResponse::new(events, query.page, query.limit, total))
}

/// Get a single event by id
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = Event),
        (status = 404, description = "Event not found")
    )
)]
pub async fn get_event(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let event = state
        .portal
        .get_event(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("EVENT_NOT_FOUND", format!("Event not found: {}", path.id))
        })?;

    Ok(ApiResponse::new(event))
}

/// Get a single event by its public slug
#[utoipa::path(
    get,
    path = "/api/v1/events/slug/{slug}",
    tag = "events",
    params(("slug" = String, Path, description = "Event slug")),
    responses(
        (status = 200, description = "Event details", body = Event),
        (status = 404, description = "Event not found")
    )
)]
pub async fn get_event_by_slug(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    path: SlugPath,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let event = state
        .portal
        .get_event_by_slug(org.as_str(), &path.slug)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found(
                "EVENT_NOT_FOUND",
                format!("Event not found: {}", path.slug),
            )
        })?;

    Ok(ApiResponse::new(event))
}

/// Aggregate counters over this tenant's events
#[utoipa::path(
    get,
    path = "/api/v1/events/stats",
    tag = "events",
    responses(
        (status = 200, description = "Event and ticket aggregates", body = EventStats)
    )
)]
pub async fn get_event_stats(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
) -> Result<Json<ApiResponse<EventStats>>, ApiError> {
    let stats = state
        .portal
        .event_stats(org.as_str())
        .await
        .map_err(ApiError::from_portal)?;

    Ok(ApiResponse::new(stats))
}

/// Create an event
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 401, description = "Missing member identity"),
        (status = 409, description = "Slug already in use")
    )
)]
pub async fn create_event(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedJson(body): ValidatedJson<CreateEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    require_viewer(viewer.as_deref())?;

    if body.ends_at <= body.starts_at {
        return Err(ApiError::bad_request(
            "INVALID_RANGE",
            "Event must end after it starts",
        ));
    }

    let event = state
        .portal
        .create_event(
            org.as_str(),
            NewEvent {
                slug: body.slug,
                title: body.title,
                description: body.description,
                location: body.location,
                capacity: body.capacity,
                starts_at: body.starts_at,
                ends_at: body.ends_at,
            },
        )
        .await
        .map_err(ApiError::from_portal)?;

    Ok((StatusCode::CREATED, ApiResponse::new(event)))
}

/// Update an event
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 404, description = "Event not found")
    )
)]
pub async fn update_event(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
    ValidatedJson(body): ValidatedJson<UpdateEventRequest>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let patch = EventPatch {
        title: body.title,
        description: body.description,
        location: body.location,
        status: body.status,
        capacity: body.capacity,
    };

    let event = state
        .portal
        .update_event(org.as_str(), &path.id, patch)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("EVENT_NOT_FOUND", format!("Event not found: {}", path.id))
        })?;

    Ok(ApiResponse::new(event))
}

/// Check the acting member in to an event.
///
/// A repeat scan inside the counter TTL window is rejected, which
/// absorbs double-taps at the door without a per-member roster.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/checkin",
    tag = "events",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Check-in recorded", body = CheckinTally),
        (status = 401, description = "Missing member identity"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Member already checked in moments ago")
    )
)]
pub async fn check_in(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    path: EntityPath,
) -> Result<Json<ApiResponse<CheckinTally>>, ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;
    let segment = ResourceFamily::Events.segment();
    let counter_ttl = ResourceFamily::Events.policy().ttl_for(ViewTier::Counter);

    let guard = CacheKey::counter(
        org.as_str(),
        segment,
        "checkin_guard",
        &format!("{}.{}", path.id, viewer.as_str()),
    );
    if state.cache.exists(&guard).await {
        return Err(ApiError::conflict(
            "ALREADY_CHECKED_IN",
            "This member was checked in moments ago",
        ));
    }

    let total = state
        .portal
        .record_checkin(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("EVENT_NOT_FOUND", format!("Event not found: {}", path.id))
        })?;

    state.cache.incr(&guard, Some(counter_ttl)).await;

    // Only the tally and the tenant aggregate embed this total
    state
        .cache
        .delete(&CacheKey::counter(org.as_str(), segment, "checkins", &path.id))
        .await;
    state
        .cache
        .delete(&CacheKey::stats(org.as_str(), segment))
        .await;

    Ok(ApiResponse::new(CheckinTally {
        event_id: path.id,
        total,
    }))
}

/// Live check-in tally, cached at the counter TTL
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/checkins",
    tag = "events",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Current tally", body = CheckinTally),
        (status = 404, description = "Event not found")
    )
)]
pub async fn checkin_tally(
    State(state): State<EventsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
) -> Result<Json<ApiResponse<CheckinTally>>, ApiError> {
    let segment = ResourceFamily::Events.segment();
    let key = CacheKey::counter(org.as_str(), segment, "checkins", &path.id);

    if let Some(total) = state.cache.get::<u64>(&key).await {
        return Ok(ApiResponse::new(CheckinTally {
            event_id: path.id,
            total,
        }));
    }

    let total = state
        .portal
        .checkin_count(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("EVENT_NOT_FOUND", format!("Event not found: {}", path.id))
        })?;

    let counter_ttl = ResourceFamily::Events.policy().ttl_for(ViewTier::Counter);
    state.cache.set(&key, &total, Some(counter_ttl)).await;

    Ok(ApiResponse::new(CheckinTally {
        event_id: path.id,
        total,
    }))
}
