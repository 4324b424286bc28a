//! Cache Module
//!
//! In-process TTL caching of remote payloads, partitioned by category, with
//! hit/miss monitoring and write-triggered invalidation.

mod category;
mod entry;
mod eviction;
mod invalidation;
mod monitor;
mod service_cache;
mod store;


// Re-export public types
pub use category::{CacheCategory, CacheSlot};
pub use entry::CacheEntry;
pub use eviction::{EvictionPolicy, WriteOrder};
pub use invalidation::{DomainEvent, InvalidationHooks};
pub use monitor::{AdaptiveTtlPolicy, CacheMonitor, CacheStatsSnapshot, CategoryStats, TtlProfile};
pub use service_cache::ServiceCache;
pub use store::{Lookup, SetOutcome, TtlStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
