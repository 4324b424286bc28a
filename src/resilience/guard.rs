//! Guarded remote calls.
//!
//! Composes the pieces in the order a caller needs them:
//! circuit breaker → retry loop → (rate-limit wait → call).
//! A 429 feeds the backoff tracker on every attempt; the outcome of the
//! whole retry sequence counts once toward the breaker.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::cache::CacheMonitor;
use crate::remote::RemoteError;
use crate::resilience::{
    retry_with_backoff, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitSnapshot, RateLimitTracker, RetryPolicy,
};

/// Result of a guarded call.
pub type GuardedResult<T> = Result<T, CircuitBreakerError<RemoteError>>;

/// Shared resilience state for every remote service this process calls.
#[derive(Debug)]
pub struct ResilientCaller {
    breakers: CircuitBreakerRegistry,
    rate_limits: RateLimitTracker,
    retry: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(
        circuit: CircuitBreakerConfig,
        retry: RetryPolicy,
        monitor: Arc<CacheMonitor>,
    ) -> Self {
        Self::from_parts(
            CircuitBreakerRegistry::new(circuit),
            RateLimitTracker::new(monitor),
            retry,
        )
    }

    pub fn from_parts(
        breakers: CircuitBreakerRegistry,
        rate_limits: RateLimitTracker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            breakers,
            rate_limits,
            retry,
        }
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn rate_limits(&self) -> &RateLimitTracker {
        &self.rate_limits
    }

    // == Call ==
    /// Runs `operation` against `service` under breaker, retry and rate-limit control.
    ///
    /// `operation` is invoked once per attempt and must build a fresh request each time.
    pub async fn call<F, Fut, T>(&self, service: &str, mut operation: F) -> GuardedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let retry = &self.retry;
        let rate_limits = &self.rate_limits;
        let operation = &mut operation;

        self.breakers
            .execute(service, move || async move {
                retry_with_backoff(retry, move || {
                    let attempt = operation();
                    async move {
                        rate_limits.check_and_wait(service).await;
                        match attempt.await {
                            Ok(value) => {
                                rate_limits.on_success(service).await;
                                Ok(value)
                            }
                            Err(error) => {
                                if let RemoteError::RateLimited { retry_after, .. } = &error {
                                    rate_limits.on_rate_limited(service, *retry_after).await;
                                }
                                debug!(service, error = %error, "Remote attempt failed");
                                Err(error)
                            }
                        }
                    }
                })
                .await
            })
            .await
    }

    pub async fn circuit_snapshots(&self) -> Vec<CircuitSnapshot> {
        self.breakers.snapshots().await
    }
}
