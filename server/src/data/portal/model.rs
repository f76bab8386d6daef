//! Portal domain records
//!
//! Rows served by the relational store behind the portal API. Every
//! record carries its `org_id`; repositories never return rows across
//! tenant boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Posts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub id: String,
    pub org_id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
}

/// Partial update for a post; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub archived: Option<bool>,
}

/// List filters for posts; mirrors the post list query surface
#[derive(Debug, Clone, Default)]
pub struct PostListParams {
    pub status: Option<PostStatus>,
    pub include_archived: bool,
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub ascending: bool,
    pub page: u32,
    pub limit: u32,
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: String,
    pub org_id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub status: EventStatus,
    pub capacity: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub capacity: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<EventStatus>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct EventListParams {
    pub status: Option<EventStatus>,
    pub search: Option<String>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub ascending: bool,
    pub page: u32,
    pub limit: u32,
}

/// Aggregate counters for the events dashboard
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventStats {
    pub total_events: u64,
    pub upcoming_events: u64,
    pub tickets_sold: u64,
    pub checkins: u64,
}

// =============================================================================
// Tickets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Reserved,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    pub id: String,
    pub org_id: String,
    pub event_id: String,
    pub holder_id: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TicketListParams {
    pub status: Option<TicketStatus>,
    pub event_id: Option<String>,
    pub holder_id: Option<String>,
    pub ascending: bool,
    pub page: u32,
    pub limit: u32,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub org_id: String,
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Read-state filter for notification lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

// =============================================================================
// Alumni directory
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlumniProfile {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub email: String,
    pub grad_year: i32,
    pub department: String,
    pub city: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub department: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryListParams {
    pub grad_year: Option<i32>,
    pub search: Option<String>,
    pub ascending: bool,
    pub page: u32,
    pub limit: u32,
}
