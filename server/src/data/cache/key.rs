//! Tenant-scoped cache key builders
//!
//! Every response key starts with a `tenant:{org}` segment so pattern
//! invalidation and purges can never cross organization boundaries.
//! List keys append each filter dimension as a `name:value` pair in
//! sorted dimension order, so two logically identical requests produce
//! byte-identical keys no matter how the query string was ordered.

use std::collections::BTreeMap;

use crate::core::constants::MAX_KEY_VALUE_LEN;

/// Static key builders for fixed view shapes
pub struct CacheKey;

impl CacheKey {
    /// Detail view key: `tenant:{org}:{family}:id:{id}`
    pub fn detail(tenant: &str, family: &str, id: &str) -> String {
        format!(
            "tenant:{}:{}:id:{}",
            sanitize_value(tenant),
            family,
            sanitize_value(id)
        )
    }

    /// Slug lookup key: `tenant:{org}:{family}:slug:{slug}`
    pub fn slug(tenant: &str, family: &str, slug: &str) -> String {
        format!(
            "tenant:{}:{}:slug:{}",
            sanitize_value(tenant),
            family,
            sanitize_value(slug)
        )
    }

    /// Aggregate view key: `tenant:{org}:{family}:stats`
    pub fn stats(tenant: &str, family: &str) -> String {
        format!("tenant:{}:{}:stats", sanitize_value(tenant), family)
    }

    /// Viewer-scoped view key: `tenant:{org}:{family}:{view}:{viewer}`
    ///
    /// Used for views whose payload belongs to one member, e.g.
    /// `notifications:unread:u42` or `tickets:mine:u42`.
    pub fn viewer_view(tenant: &str, family: &str, view: &str, viewer: &str) -> String {
        format!(
            "tenant:{}:{}:{}:{}",
            sanitize_value(tenant),
            family,
            view,
            sanitize_value(viewer)
        )
    }

    /// Volatile counter key: `tenant:{org}:{family}:{counter}:{id}`
    ///
    /// Backed by `incr`, e.g. live event check-in tallies.
    pub fn counter(tenant: &str, family: &str, counter: &str, id: &str) -> String {
        format!(
            "tenant:{}:{}:{}:{}",
            sanitize_value(tenant),
            family,
            counter,
            sanitize_value(id)
        )
    }

    /// Glob matching every key of one family under one tenant
    pub fn family_pattern(tenant: &str, family: &str) -> String {
        format!("tenant:{}:{}:*", sanitize_value(tenant), family)
    }

    /// Glob matching one view prefix of a family, e.g. all list pages
    pub fn view_pattern(tenant: &str, family: &str, view: &str) -> String {
        format!("tenant:{}:{}:{}:*", sanitize_value(tenant), family, view)
    }

    /// Glob matching the entire tenant keyspace
    pub fn tenant_pattern(tenant: &str) -> String {
        format!("tenant:{}:*", sanitize_value(tenant))
    }

    /// Rate limit counter key
    ///
    /// Rate limit keys are infrastructural, not tenant response data, so
    /// they live outside the `tenant:` namespace and are never touched
    /// by invalidation patterns.
    pub fn rate_limit(bucket: &str, identifier: &str) -> String {
        format!("rl:{}:{}", bucket, identifier)
    }
}

/// Builder for list view keys with filter dimensions.
///
/// Dimensions are collected into a sorted map, so insertion order never
/// leaks into the key. Callers fill every dimension the view declares,
/// substituting the declared placeholder when a request omits one.
pub struct ListKey {
    prefix: String,
    dims: BTreeMap<String, String>,
}

impl ListKey {
    /// Start a list key: `tenant:{org}:{family}:all`
    pub fn new(tenant: &str, family: &str) -> Self {
        Self {
            prefix: format!("tenant:{}:{}:all", sanitize_value(tenant), family),
            dims: BTreeMap::new(),
        }
    }

    /// Add a filter dimension. Values are normalized and sanitized; an
    /// empty value is recorded as `none`.
    pub fn dim(mut self, name: &str, value: &str) -> Self {
        let v = sanitize_value(value);
        let v = if v.is_empty() { "none".to_string() } else { v };
        self.dims.insert(name.to_string(), v);
        self
    }

    pub fn build(self) -> String {
        let mut key = self.prefix;
        for (name, value) in &self.dims {
            key.push(':');
            key.push_str(name);
            key.push(':');
            key.push_str(value);
        }
        key
    }
}

/// Normalize and sanitize one key segment value.
///
/// Trimmed, with case preserved: tenant and viewer ids are
/// case-sensitive everywhere else, so `Org1` and `org1` must never
/// share a key. Characters with structural meaning in keys or globs
/// (`:`, `*`, `?`, `[`, `]`, whitespace) are replaced so request input
/// can never forge extra segments or widen an invalidation pattern.
/// Values longer than [`MAX_KEY_VALUE_LEN`] keep a readable head plus
/// an 8-char md5 of the full value, the same trick the stats keys use
/// for free-text search terms.
pub fn sanitize_value(value: &str) -> String {
    let normalized: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, ':' | '*' | '?' | '[' | ']') {
                '_'
            } else {
                c
            }
        })
        .collect();

    if normalized.len() > MAX_KEY_VALUE_LEN {
        let hash = &format!("{:x}", md5::compute(normalized.as_bytes()))[..8];
        let head: String = normalized.chars().take(MAX_KEY_VALUE_LEN - 9).collect();
        format!("{head}-{hash}")
    } else {
        normalized
    }
}

/// Collapse a set-valued dimension (e.g. tags) into one segment value.
///
/// Members are sanitized, sorted, deduplicated, and joined with `.` so
/// `?tags=b&tags=a` and `?tags=a&tags=b` key identically. Returns an
/// empty string for an empty set; callers substitute the placeholder.
pub fn multi_value(values: &[String]) -> String {
    let mut parts: Vec<String> = values
        .iter()
        .map(|v| sanitize_value(v))
        .filter(|v| !v.is_empty())
        .collect();
    parts.sort();
    parts.dedup();
    parts.join(".")
}
