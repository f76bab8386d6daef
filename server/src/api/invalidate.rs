//! Write-path cache invalidation
//!
//! Mutation routes are wrapped in one middleware that sweeps the
//! mutated family's cached views after the handler succeeds. The sweep
//! is planned from the policy tables, so a route never names keys: it
//! names its family and the plan covers the family's own views plus
//! every linked family's collection views.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

use super::read_cache::last_segment;
use super::tenant::TenantId;
use crate::data::cache::{Invalidator, ResourceFamily};

/// Per-router invalidation declaration, passed to
/// [`invalidate_on_write`] as state.
#[derive(Clone)]
pub struct MutationSweep {
    invalidator: Invalidator,
    family: ResourceFamily,
}

impl MutationSweep {
    pub fn new(invalidator: Invalidator, family: ResourceFamily) -> Self {
        Self {
            invalidator,
            family,
        }
    }
}

/// Sweep the family's cache after a successful mutation.
///
/// The sweep is spawned once the response status is known, so the
/// client never waits on the store. Until it lands, an immediate
/// re-read can still serve the pre-mutation payload; the staleness
/// window is bounded by the view's TTL even if the sweep fails.
pub async fn invalidate_on_write(
    State(sweep): State<MutationSweep>,
    request: Request,
    next: Next,
) -> Response {
    if !matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    ) {
        return next.run(request).await;
    }

    let tenant = request.extensions().get::<TenantId>().cloned();

    // Entity-addressed methods carry the id as the trailing path
    // segment; the hint adds an exact detail-key delete to the plan.
    let entity = match *request.method() {
        Method::PUT | Method::PATCH | Method::DELETE => {
            last_segment(request.uri().path()).map(str::to_string)
        }
        _ => None,
    };

    let response = next.run(request).await;

    if response.status().is_success()
        && let Some(tenant) = tenant
    {
        let MutationSweep {
            invalidator,
            family,
        } = sweep;
        tokio::spawn(async move {
            invalidator
                .invalidate_mutation(family, tenant.as_str(), entity.as_deref(), None)
                .await;
        });
    }

    response
}
