//! # Resilience Module
//!
//! Failure handling for calls to sibling services.
//!
//! - **Circuit breakers**: one per remote service, fail fast while it is down
//! - **Rate-limit tracker**: per-service backoff windows opened by HTTP 429
//! - **Retry**: exponential backoff with jitter for transient failures
//! - **Guard**: the composition used by the catalog gateway
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use service_resilience::cache::CacheMonitor;
//! use service_resilience::remote::RemoteError;
//! use service_resilience::resilience::{CircuitBreakerConfig, ResilientCaller, RetryPolicy};
//!
//! # async fn example() {
//! let caller = ResilientCaller::new(
//!     CircuitBreakerConfig::default(),
//!     RetryPolicy::default(),
//!     Arc::new(CacheMonitor::new()),
//! );
//!
//! let result = caller
//!     .call("course-service", || async { Ok::<_, RemoteError>(42) })
//!     .await;
//! # }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod guard;
pub mod rate_limit;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitSnapshot, CircuitState,
};
pub use guard::{GuardedResult, ResilientCaller};
pub use rate_limit::RateLimitTracker;
pub use retry::{retry_with_backoff, RetryClassify, RetryPolicy};
