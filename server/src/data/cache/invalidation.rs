//! Pattern-based cache invalidation
//!
//! A mutation never edits cached entries in place. It enumerates an
//! [`InvalidationPlan`] from the policy tables and sweeps it: exact
//! deletes for the keys it can name, glob sweeps for everything else.
//! Plans are idempotent, so re-running one after a partial failure only
//! costs the extra round trips.

use std::sync::Arc;

use super::CacheService;
use super::key::CacheKey;
use super::policy::ResourceFamily;

/// The full set of keys and patterns one mutation makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Exact keys to delete
    pub keys: Vec<String>,
    /// Glob patterns to sweep
    pub patterns: Vec<String>,
}

impl InvalidationPlan {
    /// Plan the sweep for a mutation of one entity (or of the family at
    /// large, when no entity is identifiable).
    ///
    /// The mutated family is swept whole: its lists, details, slugs,
    /// aggregates, and counters all embed the changed entity. Linked
    /// families lose only their collection-shaped views (lists, stats,
    /// and any volatile viewer views); their details do not embed this
    /// family's data.
    pub fn for_mutation(
        family: ResourceFamily,
        tenant: &str,
        entity_id: Option<&str>,
        slug: Option<&str>,
    ) -> Self {
        let segment = family.segment();
        let mut keys = Vec::new();
        let mut patterns = Vec::new();

        if let Some(id) = entity_id {
            keys.push(CacheKey::detail(tenant, segment, id));
        }
        if let Some(slug) = slug {
            keys.push(CacheKey::slug(tenant, segment, slug));
        }
        patterns.push(CacheKey::family_pattern(tenant, segment));

        for linked in family.policy().linked {
            let linked_segment = linked.segment();
            patterns.push(CacheKey::view_pattern(tenant, linked_segment, "all"));
            keys.push(CacheKey::stats(tenant, linked_segment));
            for view in linked.policy().volatile_views {
                patterns.push(CacheKey::view_pattern(tenant, linked_segment, view));
            }
        }

        Self { keys, patterns }
    }

    /// Plan a purge of one family's whole keyspace under a tenant
    pub fn for_family(tenant: &str, family: ResourceFamily) -> Self {
        Self {
            keys: Vec::new(),
            patterns: vec![CacheKey::family_pattern(tenant, family.segment())],
        }
    }

    /// Plan a purge of everything a tenant has cached
    pub fn for_tenant(tenant: &str) -> Self {
        Self {
            keys: Vec::new(),
            patterns: vec![CacheKey::tenant_pattern(tenant)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.patterns.is_empty()
    }
}

/// Executes invalidation plans against the cache service.
///
/// Failures stay inside the cache layer: a sweep that cannot reach the
/// store logs and reports zero removals, and the stale entries age out
/// by TTL instead.
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<CacheService>,
}

impl Invalidator {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Sweep a plan. Returns the number of entries removed.
    pub async fn run(&self, plan: &InvalidationPlan) -> u64 {
        if plan.is_empty() {
            return 0;
        }
        let mut removed = 0u64;
        for key in &plan.keys {
            if self.cache.delete(key).await {
                removed += 1;
            }
        }
        for pattern in &plan.patterns {
            removed += self.cache.delete_pattern(pattern).await;
        }
        removed
    }

    /// Plan and sweep for one mutation
    pub async fn invalidate_mutation(
        &self,
        family: ResourceFamily,
        tenant: &str,
        entity_id: Option<&str>,
        slug: Option<&str>,
    ) -> u64 {
        let plan = InvalidationPlan::for_mutation(family, tenant, entity_id, slug);
        let removed = self.run(&plan).await;
        tracing::debug!(
            family = %family,
            tenant = %tenant,
            entity_id = entity_id.unwrap_or("-"),
            keys = plan.keys.len(),
            patterns = plan.patterns.len(),
            removed,
            "Invalidated after mutation"
        );
        removed
    }

    /// Purge one family under a tenant (admin surface)
    pub async fn purge_family(&self, tenant: &str, family: ResourceFamily) -> u64 {
        self.run(&InvalidationPlan::for_family(tenant, family)).await
    }

    /// Purge a tenant's entire cached keyspace (admin surface)
    pub async fn purge_tenant(&self, tenant: &str) -> u64 {
        self.run(&InvalidationPlan::for_tenant(tenant)).await
    }
}
