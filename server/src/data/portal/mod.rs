//! Portal data access
//!
//! The relational store behind the portal API sits behind one
//! repository trait so handlers never touch a concrete backend. The
//! in-memory implementation backs local development and tests; the
//! cache layer treats whatever implements this trait as the origin.

pub mod memory;
pub mod model;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryPortal;
pub use model::*;

/// Errors from the portal's relational store
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Repository over the portal's relational store.
///
/// Every method takes the tenant's `org_id` first and only ever reads
/// or writes rows of that tenant. Paginated lists return the page plus
/// the total row count for the filter.
#[async_trait]
pub trait PortalRepository: Send + Sync {
    // ==================== Posts ====================

    async fn list_posts(
        &self,
        org_id: &str,
        params: &PostListParams,
    ) -> Result<(Vec<Post>, u64), PortalError>;

    async fn get_post(&self, org_id: &str, id: &str) -> Result<Option<Post>, PortalError>;

    async fn create_post(&self, org_id: &str, post: NewPost) -> Result<Post, PortalError>;

    async fn update_post(
        &self,
        org_id: &str,
        id: &str,
        patch: PostPatch,
    ) -> Result<Option<Post>, PortalError>;

    async fn delete_post(&self, org_id: &str, id: &str) -> Result<bool, PortalError>;

    // ==================== Events ====================

    async fn list_events(
        &self,
        org_id: &str,
        params: &EventListParams,
    ) -> Result<(Vec<Event>, u64), PortalError>;

    async fn get_event(&self, org_id: &str, id: &str) -> Result<Option<Event>, PortalError>;

    async fn get_event_by_slug(
        &self,
        org_id: &str,
        slug: &str,
    ) -> Result<Option<Event>, PortalError>;

    async fn create_event(&self, org_id: &str, event: NewEvent) -> Result<Event, PortalError>;

    async fn update_event(
        &self,
        org_id: &str,
        id: &str,
        patch: EventPatch,
    ) -> Result<Option<Event>, PortalError>;

    /// Record one attendee check-in. Returns the persisted total, or
    /// `None` when the event does not exist.
    async fn record_checkin(&self, org_id: &str, event_id: &str)
    -> Result<Option<u64>, PortalError>;

    /// Current check-in tally for one event, `None` when it does not exist
    async fn checkin_count(&self, org_id: &str, event_id: &str)
    -> Result<Option<u64>, PortalError>;

    /// Aggregate counters over this tenant's events and tickets
    async fn event_stats(&self, org_id: &str) -> Result<EventStats, PortalError>;

    // ==================== Tickets ====================

    async fn list_tickets(
        &self,
        org_id: &str,
        params: &TicketListParams,
    ) -> Result<(Vec<Ticket>, u64), PortalError>;

    async fn get_ticket(&self, org_id: &str, id: &str) -> Result<Option<Ticket>, PortalError>;

    /// Issue a ticket for an event. Fails with `Conflict` when the
    /// event is at capacity and `NotFound` when it does not exist.
    async fn purchase_ticket(
        &self,
        org_id: &str,
        event_id: &str,
        holder_id: &str,
    ) -> Result<Ticket, PortalError>;

    // ==================== Notifications ====================

    async fn list_notifications(
        &self,
        org_id: &str,
        recipient_id: &str,
        filter: ReadFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Notification>, u64), PortalError>;

    async fn unread_count(&self, org_id: &str, recipient_id: &str) -> Result<u64, PortalError>;

    async fn create_notification(
        &self,
        org_id: &str,
        recipient_id: &str,
        title: &str,
        body: &str,
    ) -> Result<Notification, PortalError>;

    /// Mark every unread notification of one recipient as read.
    /// Returns how many flipped.
    async fn mark_all_read(&self, org_id: &str, recipient_id: &str) -> Result<u64, PortalError>;

    // ==================== Alumni directory ====================

    async fn list_profiles(
        &self,
        org_id: &str,
        params: &DirectoryListParams,
    ) -> Result<(Vec<AlumniProfile>, u64), PortalError>;

    async fn get_profile(
        &self,
        org_id: &str,
        id: &str,
    ) -> Result<Option<AlumniProfile>, PortalError>;

    async fn create_profile(
        &self,
        org_id: &str,
        profile: AlumniProfile,
    ) -> Result<AlumniProfile, PortalError>;

    async fn update_profile(
        &self,
        org_id: &str,
        id: &str,
        patch: ProfilePatch,
    ) -> Result<Option<AlumniProfile>, PortalError>;
}
