//! Event ticket endpoints
//!
//! The general list is identity-scoped: members see their own tickets,
//! unauthenticated callers see the tenant-wide list. `/mine` is the
//! short-TTL per-member view that check-in screens poll.

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
    ApiError, ApiResponse, MAX_PAGE_LIMIT, PaginatedResponse, default_limit, default_page,
    parse_order_param, validate_limit, validate_page,
};
use crate::data::cache::{CacheService, Invalidator, ResourceFamily, ViewTier};
use crate::data::portal::{PortalRepository, Ticket, TicketListParams, TicketStatus};

/// Status filter accepted by the list endpoint; omitted means `all`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatusFilter {
    All,
    Reserved,
    Paid,
    Cancelled,
}

impl TicketStatusFilter {
    fn to_status(self) -> Option<TicketStatus> {
        match self {
            TicketStatusFilter::All => None,
            TicketStatusFilter::Reserved => Some(TicketStatus::Reserved),
            TicketStatusFilter::Paid => Some(TicketStatus::Paid),
            TicketStatusFilter::Cancelled => Some(TicketStatus::Cancelled),
        }
    }
}

/// Query params for listing tickets
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListTicketsQuery {
    #[serde(default = "default_page")]
    #[validate(custom(function = "validate_page"))]
    pub page: u32,

    #[serde(default = "default_limit")]
    #[validate(custom(function = "validate_limit"))]
    pub limit: u32,

    pub status: Option<TicketStatusFilter>,

    /// Restrict to one event
    #[validate(length(min = 1, max = 128, message = "Event ID must be 1-128 characters"))]
    pub event: Option<String>,

    /// `asc` or `desc` by purchase time (default `desc`)
    pub order: Option<String>,
}

/// Request body for purchasing a ticket
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PurchaseTicketRequest {
    #[validate(length(min = 1, max = 128, message = "Event ID must be 1-128 characters"))]
    pub event_id: String,
}

/// Shared state for ticket endpoints
#[derive(Clone)]
pub struct TicketsApiState {
    pub portal: Arc<dyn PortalRepository>,
}

/// Build ticket routes with their cache layers
pub fn routes(
    portal: Arc<dyn PortalRepository>,
    cache: Arc<CacheService>,
    invalidator: Invalidator,
) -> Router<()> {
    let list = Router::new()
        .route("/", get(list_tickets).post(purchase_ticket))
        .layer(middleware::from_fn_with_state(
            CachedView::list(cache.clone(), ResourceFamily::Tickets),
            read_through,
        ));

    let mine = Router::new().route("/mine", get(my_tickets)).layer(
        middleware::from_fn_with_state(
            CachedView::viewer(cache.clone(), ResourceFamily::Tickets, "mine", ViewTier::List),
            read_through,
        ),
    );

    let detail = Router::new().route("/{id}", get(get_ticket)).layer(
        middleware::from_fn_with_state(
            CachedView::detail(cache, ResourceFamily::Tickets),
            read_through,
        ),
    );

    list.merge(mine)
        .merge(detail)
        .layer(middleware::from_fn_with_state(
            MutationSweep::new(invalidator, ResourceFamily::Tickets),
            invalidate_on_write,
        ))
        .with_state(TicketsApiState { portal })
}

/// List tickets. Members see their own; anonymous callers see all.
#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    tag = "tickets",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("limit" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("status" = Option<String>, Query, description = "all | reserved | paid | cancelled (default all)"),
        ("event" = Option<String>, Query, description = "Restrict to one event"),
        ("order" = Option<String>, Query, description = "asc | desc (default desc)")
    ),
    responses(
        (status = 200, description = "Page of tickets with pagination metadata")
    )
)]
pub async fn list_tickets(
    State(state): State<TicketsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedQuery(query): ValidatedQuery<ListTicketsQuery>,
) -> Result<Json<PaginatedResponse<Ticket>>, ApiError> {
    let params = TicketListParams {
        status: query.status.unwrap_or(TicketStatusFilter::All).to_status(),
        event_id: query.event,
        holder_id: viewer.map(|v| v.as_str().to_string()),
        ascending: parse_order_param(&query.order, false)?,
        page: query.page,
        limit: query.limit,
    };

    let (tickets, total) = state
        .portal
        .list_tickets(org.as_str(), &params)
        .await
        .map_err(ApiError::from_portal)?;

    Ok(PaginatedResponse::new(tickets, query.page, query.limit, total))
}

/// All tickets held by the acting member, newest first
#[utoipa::path(
    get,
    path = "/api/v1/tickets/mine",
    tag = "tickets",
    responses(
        (status = 200, description = "The member's tickets", body = Vec<Ticket>),
        (status = 401, description = "Missing member identity")
    )
)]
pub async fn my_tickets(
    State(state): State<TicketsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
) -> Result<Json<ApiResponse<Vec<Ticket>>>, ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    let params = TicketListParams {
        holder_id: Some(viewer.as_str().to_string()),
        page: 1,
        limit: MAX_PAGE_LIMIT,
        ..Default::default()
    };

    let (tickets, _) = state
        .portal
        .list_tickets(org.as_str(), &params)
        .await
        .map_err(ApiError::from_portal)?;

    Ok(ApiResponse::new(tickets))
}

/// Get a single ticket
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}",
    tag = "tickets",
    params(("id" = String, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket details", body = Ticket),
        (status = 404, description = "Ticket not found")
    )
)]
pub async fn get_ticket(
    State(state): State<TicketsApiState>,
    Extension(org): Extension<TenantId>,
    path: EntityPath,
) -> Result<Json<ApiResponse<Ticket>>, ApiError> {
    let ticket = state
        .portal
        .get_ticket(org.as_str(), &path.id)
        .await
        .map_err(ApiError::from_portal)?
        .ok_or_else(|| {
            ApiError::not_found("TICKET_NOT_FOUND", format!("Ticket not found: {}", path.id))
        })?;

    Ok(ApiResponse::new(ticket))
}

/// Purchase a ticket for an event on behalf of the acting member
#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    tag = "tickets",
    request_body = PurchaseTicketRequest,
    responses(
        (status = 201, description = "Ticket issued", body = Ticket),
        (status = 401, description = "Missing member identity"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Event at capacity")
    )
)]
pub async fn purchase_ticket(
    State(state): State<TicketsApiState>,
    Extension(org): Extension<TenantId>,
    viewer: Option<Extension<ViewerId>>,
    ValidatedJson(body): ValidatedJson<PurchaseTicketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Ticket>>), ApiError> {
    let viewer = require_viewer(viewer.as_deref())?;

    let ticket = state
        .portal
        .purchase_ticket(org.as_str(), &body.event_id, viewer.as_str())
        .await
        .map_err(ApiError::from_portal)?;

    Ok((StatusCode::CREATED, ApiResponse::new(ticket)))
}
