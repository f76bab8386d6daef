//! API route handlers

pub mod admin;
pub mod directory;
pub mod events;
pub mod health;
pub mod notifications;
pub mod posts;
pub mod tickets;
