//! Data layer
//!
//! Provides the storage services for the application:
//! - `cache` - In-memory and Redis caching, key naming, invalidation and
//!   rate limiting
//! - `portal` - Portal content repository (posts, events, tickets,
//!   notifications, alumni directory)

pub mod cache;
pub mod portal;

pub use portal::PortalError;
