//! API server and routes

pub mod extractors;
pub mod invalidate;
pub mod middleware;
pub mod openapi;
pub mod rate_limit;
pub mod read_cache;
pub mod routes;
mod server;
pub mod tenant;
pub mod types;

pub use server::ApiServer;
