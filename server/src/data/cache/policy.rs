//! Per-resource cache policy registry
//!
//! One declarative table per resource family drives the whole cache
//! pipeline: which filter dimensions a list key carries, which TTL each
//! view tier gets, and which other families go stale when this one
//! mutates. Adding a cacheable resource means adding a policy here and
//! wiring routes; the key builder, read-through layer, and invalidation
//! engine all read from these tables.

use std::fmt;
use std::time::Duration;

/// Cacheable resource families of the portal API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    /// Alumni directory profiles
    Users,
    /// Feed posts
    Posts,
    /// Reunions, meetups, webinars
    Events,
    /// Event tickets
    Tickets,
    /// Polls and surveys
    Polls,
    /// Interest and batch groups
    Groups,
    /// Per-member notifications
    Notifications,
    /// Merchandise catalog
    Merchandise,
    /// Feedback and suggestions
    Feedback,
    /// Blood donor network
    LifeLink,
    /// Sponsors and donation aggregates
    Sponsors,
}

impl ResourceFamily {
    pub const ALL: [ResourceFamily; 11] = [
        ResourceFamily::Users,
        ResourceFamily::Posts,
        ResourceFamily::Events,
        ResourceFamily::Tickets,
        ResourceFamily::Polls,
        ResourceFamily::Groups,
        ResourceFamily::Notifications,
        ResourceFamily::Merchandise,
        ResourceFamily::Feedback,
        ResourceFamily::LifeLink,
        ResourceFamily::Sponsors,
    ];

    /// Key segment for this family
    pub fn segment(self) -> &'static str {
        match self {
            ResourceFamily::Users => "users",
            ResourceFamily::Posts => "posts",
            ResourceFamily::Events => "events",
            ResourceFamily::Tickets => "tickets",
            ResourceFamily::Polls => "polls",
            ResourceFamily::Groups => "groups",
            ResourceFamily::Notifications => "notifications",
            ResourceFamily::Merchandise => "merchandise",
            ResourceFamily::Feedback => "feedback",
            ResourceFamily::LifeLink => "lifelink",
            ResourceFamily::Sponsors => "sponsors",
        }
    }

    /// Parse a family from its key segment (admin purge endpoint input)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.segment() == s.trim().to_lowercase())
    }

    pub fn policy(self) -> &'static ResourcePolicy {
        match self {
            ResourceFamily::Users => &USERS,
            ResourceFamily::Posts => &POSTS,
            ResourceFamily::Events => &EVENTS,
            ResourceFamily::Tickets => &TICKETS,
            ResourceFamily::Polls => &POLLS,
            ResourceFamily::Groups => &GROUPS,
            ResourceFamily::Notifications => &NOTIFICATIONS,
            ResourceFamily::Merchandise => &MERCHANDISE,
            ResourceFamily::Feedback => &FEEDBACK,
            ResourceFamily::LifeLink => &LIFELINK,
            ResourceFamily::Sponsors => &SPONSORS,
        }
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment())
    }
}

/// One filter dimension of a list view.
///
/// `name` doubles as the query parameter name. `placeholder` is the
/// segment value recorded when a request omits the parameter, so
/// omitted and defaulted requests share one key.
#[derive(Debug, Clone, Copy)]
pub struct DimSpec {
    pub name: &'static str,
    pub placeholder: &'static str,
}

const fn dim(name: &'static str, placeholder: &'static str) -> DimSpec {
    DimSpec { name, placeholder }
}

/// View tiers with distinct volatility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTier {
    /// Paginated collections; stale quickly as members write
    List,
    /// Single entities; stable between edits
    Detail,
    /// Aggregates that tolerate staleness
    Stats,
    /// Live tallies (check-ins, unread counts)
    Counter,
}

/// TTL per view tier for one family
#[derive(Debug, Clone, Copy)]
pub struct TtlTier {
    pub list: Duration,
    pub detail: Duration,
    pub stats: Duration,
    pub counter: Duration,
}

const fn ttl(list: u64, detail: u64, stats: u64, counter: u64) -> TtlTier {
    TtlTier {
        list: Duration::from_secs(list),
        detail: Duration::from_secs(detail),
        stats: Duration::from_secs(stats),
        counter: Duration::from_secs(counter),
    }
}

/// Cache policy for one resource family
#[derive(Debug)]
pub struct ResourcePolicy {
    pub family: ResourceFamily,
    /// List view filter dimensions, each a query parameter
    pub dims: &'static [DimSpec],
    pub ttl: TtlTier,
    /// Whether detail entities also cache under a slug lookup key
    pub has_slug: bool,
    /// Views beyond `all`/`stats` that hold volatile per-viewer or
    /// counter data (swept when a linked family mutates)
    pub volatile_views: &'static [&'static str],
    /// Families whose list/stats caches go stale when this one mutates
    pub linked: &'static [ResourceFamily],
}

impl ResourcePolicy {
    pub fn ttl_for(&self, tier: ViewTier) -> Duration {
        match tier {
            ViewTier::List => self.ttl.list,
            ViewTier::Detail => self.ttl.detail,
            ViewTier::Stats => self.ttl.stats,
            ViewTier::Counter => self.ttl.counter,
        }
    }
}

// =============================================================================
// Policy tables
// =============================================================================
//
// TTLs follow volatility: counters run 60-180s, lists 5-30min, details
// 30-60min, aggregates 15min-4h. Viewer-coupled views always carry the
// viewer as a dimension so one member never sees another's payload.

static USERS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Users,
    dims: &[
        dim("gradyear", "all"),
        dim("limit", "20"),
        dim("order", "asc"),
        dim("page", "1"),
        dim("search", "nosearch"),
    ],
    ttl: ttl(900, 3600, 3600, 120),
    has_slug: false,
    volatile_views: &[],
    linked: &[ResourceFamily::Groups, ResourceFamily::LifeLink],
};

static POSTS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Posts,
    dims: &[
        dim("archived", "notarchived"),
        dim("dateend", "noend"),
        dim("datestart", "nostart"),
        dim("limit", "10"),
        dim("order", "desc"),
        dim("page", "1"),
        dim("search", "nosearch"),
        dim("status", "published"),
        dim("tags", "notags"),
        dim("user", "anonymous"),
    ],
    ttl: ttl(300, 1800, 900, 60),
    has_slug: false,
    volatile_views: &[],
    linked: &[ResourceFamily::Groups, ResourceFamily::Notifications],
};

static EVENTS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Events,
    dims: &[
        dim("dateend", "noend"),
        dim("datestart", "nostart"),
        dim("limit", "10"),
        dim("order", "asc"),
        dim("page", "1"),
        dim("search", "nosearch"),
        dim("status", "upcoming"),
    ],
    ttl: ttl(600, 1800, 900, 60),
    has_slug: true,
    volatile_views: &["checkins"],
    linked: &[ResourceFamily::Tickets, ResourceFamily::Notifications],
};

static TICKETS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Tickets,
    dims: &[
        dim("event", "all"),
        dim("limit", "20"),
        dim("order", "desc"),
        dim("page", "1"),
        dim("status", "all"),
        dim("user", "anonymous"),
    ],
    ttl: ttl(300, 1800, 900, 60),
    has_slug: false,
    volatile_views: &["mine"],
    linked: &[ResourceFamily::Events],
};

static POLLS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Polls,
    dims: &[
        dim("limit", "10"),
        dim("order", "desc"),
        dim("page", "1"),
        dim("status", "open"),
        dim("user", "anonymous"),
    ],
    ttl: ttl(300, 1800, 900, 120),
    has_slug: false,
    volatile_views: &[],
    linked: &[ResourceFamily::Notifications],
};

static GROUPS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Groups,
    dims: &[
        dim("limit", "20"),
        dim("order", "asc"),
        dim("page", "1"),
        dim("search", "nosearch"),
        dim("user", "anonymous"),
    ],
    ttl: ttl(900, 1800, 1800, 120),
    has_slug: true,
    volatile_views: &[],
    linked: &[ResourceFamily::Posts],
};

static NOTIFICATIONS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Notifications,
    dims: &[
        dim("limit", "20"),
        dim("page", "1"),
        dim("read", "all"),
        dim("user", "anonymous"),
    ],
    ttl: ttl(300, 1800, 900, 60),
    has_slug: false,
    volatile_views: &["unread"],
    linked: &[],
};

static MERCHANDISE: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Merchandise,
    dims: &[
        dim("category", "all"),
        dim("instock", "all"),
        dim("limit", "20"),
        dim("order", "asc"),
        dim("page", "1"),
        dim("search", "nosearch"),
    ],
    ttl: ttl(1800, 3600, 3600, 180),
    has_slug: false,
    volatile_views: &[],
    linked: &[],
};

static FEEDBACK: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Feedback,
    dims: &[
        dim("category", "all"),
        dim("limit", "20"),
        dim("order", "desc"),
        dim("page", "1"),
        dim("status", "all"),
    ],
    ttl: ttl(900, 1800, 14400, 180),
    has_slug: false,
    volatile_views: &[],
    linked: &[],
};

static LIFELINK: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::LifeLink,
    dims: &[
        dim("available", "all"),
        dim("bloodgroup", "all"),
        dim("city", "all"),
        dim("limit", "20"),
        dim("order", "asc"),
        dim("page", "1"),
    ],
    ttl: ttl(600, 1800, 900, 120),
    has_slug: false,
    volatile_views: &[],
    linked: &[ResourceFamily::Users],
};

static SPONSORS: ResourcePolicy = ResourcePolicy {
    family: ResourceFamily::Sponsors,
    dims: &[
        dim("active", "all"),
        dim("limit", "20"),
        dim("order", "asc"),
        dim("page", "1"),
        dim("tier", "all"),
    ],
    ttl: ttl(1800, 3600, 14400, 180),
    has_slug: false,
    volatile_views: &[],
    linked: &[],
};
