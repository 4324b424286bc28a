//! Background Tasks Module
//!
//! Periodic work running alongside the HTTP surface.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries at the configured interval
//! - Adaptive TTL: widens TTLs under sustained high request rates

mod adaptive;
mod cleanup;

pub use adaptive::spawn_adaptive_ttl_task;
pub use cleanup::spawn_cleanup_task;
