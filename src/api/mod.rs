//! API Module
//!
//! HTTP handlers and routing for the operational surface: health, statistics,
//! circuit state, manual invalidation, domain events and read-through lookups.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
