//! Service Resilience - caching and fault tolerance for inter-service calls
//!
//! Category-partitioned TTL caching of remote catalog data, circuit breaking,
//! retry with exponential backoff, rate-limit backoff and write-triggered
//! cache invalidation, plus a small operational HTTP surface.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod remote;
pub mod resilience;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use gateway::CatalogGateway;
pub use tasks::{spawn_adaptive_ttl_task, spawn_cleanup_task};
