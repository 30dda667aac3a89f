//! HTTP API for the attendance scraper.

pub mod attendance;
pub mod error;
pub mod routes;
pub mod status;

pub use routes::create_router;
