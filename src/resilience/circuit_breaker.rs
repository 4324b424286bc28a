//! # Circuit Breaker
//!
//! Per-service fault isolation with three states: Closed (calls pass through),
//! Open (calls fail fast) and Half-Open (calls probe for recovery).
//!
//! ```text
//! Closed    → Open:      failure_count >= failure_threshold
//! Open      → Half-Open: reset_timeout elapsed since the last failure
//! Half-Open → Closed:    half_open_success_threshold successes
//! Half-Open → Open:      any failure
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - calls fail fast without executing
    Open,
    /// Testing recovery - calls are attempted and counted
    HalfOpen,
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed circuit
    pub failure_threshold: u32,
    /// Time an open circuit waits before letting a probe through
    pub reset_timeout: Duration,
    /// Successes needed in half-open before closing
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
            half_open_success_threshold: 2,
        }
    }
}

/// Errors returned through a circuit breaker
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open; the operation was not invoked
    #[error("Circuit breaker is open for {service}")]
    CircuitOpen { service: String },

    /// Operation ran and failed; the failure was recorded
    #[error("{0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }

    /// The underlying operation error, if the operation ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CircuitBreakerError::OperationFailed(e) => Some(e),
            CircuitBreakerError::CircuitOpen { .. } => None,
        }
    }
}

/// Point-in-time view of a breaker for the operational surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub service: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub successes_in_half_open: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub total_calls: u64,
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    successes_in_half_open: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    total_calls: u64,
    rejected_calls: u64,
}

impl CircuitInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            successes_in_half_open: 0,
            last_failure: None,
            last_failure_at: None,
            total_calls: 0,
            rejected_calls: 0,
        }
    }
}

/// Circuit breaker guarding one remote service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let service = service.into();
        debug!(
            service = %service,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            half_open_success_threshold = config.half_open_success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            service,
            config,
            inner: Mutex::new(CircuitInner::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// Returns `CircuitOpen` without calling `operation` while the circuit is
    /// open and the reset timeout has not elapsed.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire().await {
            return Err(CircuitBreakerError::CircuitOpen {
                service: self.service.clone(),
            });
        }

        let result = operation().await;

        match &result {
            Ok(_) => self.record_success().await,
            Err(_) => self.record_failure().await,
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decides whether a call may proceed, moving Open → Half-Open when due.
    async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let allowed = match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.reset_timeout);
                if elapsed >= self.config.reset_timeout {
                    self.transition_to_half_open(&mut inner);
                    true
                } else {
                    false
                }
            }
        };

        if allowed {
            inner.total_calls += 1;
        } else {
            inner.rejected_calls += 1;
            debug!(service = %self.service, "Circuit open, failing fast");
        }
        allowed
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.successes_in_half_open += 1;
                debug!(
                    service = %self.service,
                    successes = inner.successes_in_half_open,
                    needed = self.config.half_open_success_threshold,
                    "Half-open probe succeeded"
                );
                if inner.successes_in_half_open >= self.config.half_open_success_threshold {
                    self.transition_to_closed(&mut inner);
                }
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late
                debug!(service = %self.service, "Success recorded while circuit is open");
            }
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                warn!(
                    service = %self.service,
                    failure_count = inner.failure_count,
                    failure_threshold = self.config.failure_threshold,
                    "Call through circuit failed"
                );
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition_to_open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to_open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn transition_to_closed(&self, inner: &mut CircuitInner) {
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.successes_in_half_open = 0;
        info!(service = %self.service, "Circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self, inner: &mut CircuitInner) {
        inner.state = CircuitState::Open;
        inner.successes_in_half_open = 0;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());
        error!(
            service = %self.service,
            failure_count = inner.failure_count,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            "Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self, inner: &mut CircuitInner) {
        inner.state = CircuitState::HalfOpen;
        inner.failure_count = 0;
        inner.successes_in_half_open = 0;
        info!(service = %self.service, "Circuit breaker half-open (testing recovery)");
    }

    /// Force the circuit open, e.g. during a known outage.
    pub async fn force_open(&self) {
        warn!(service = %self.service, "Circuit breaker forced open");
        let mut inner = self.inner.lock().await;
        self.transition_to_open(&mut inner);
    }

    /// Force the circuit closed after manual recovery.
    pub async fn force_closed(&self) {
        warn!(service = %self.service, "Circuit breaker forced closed");
        let mut inner = self.inner.lock().await;
        self.transition_to_closed(&mut inner);
    }

    pub async fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock().await;
        CircuitSnapshot {
            service: self.service.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            successes_in_half_open: inner.successes_in_half_open,
            last_failure_at: inner.last_failure_at,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
        }
    }
}

/// Lazily created breakers keyed by service name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Use `config` instead of the default for `service`.
    pub fn with_override(mut self, service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(service.into(), config);
        self
    }

    /// Creates breakers for `services` up front so snapshots list them before first use.
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let breakers = self.breakers.get_mut();
        for service in services {
            let service = service.into();
            let config = self
                .overrides
                .get(&service)
                .cloned()
                .unwrap_or_else(|| self.default_config.clone());
            breakers
                .entry(service.clone())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(service, config)));
        }
        self
    }

    /// Returns the breaker for `service`, creating it on first use.
    pub async fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(service) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(service)
                    .cloned()
                    .unwrap_or_else(|| self.default_config.clone());
                Arc::new(CircuitBreaker::new(service, config))
            })
            .clone()
    }

    pub async fn execute<F, Fut, T, E>(
        &self,
        service: &str,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker(service).await.execute(operation).await
    }

    /// Snapshots of every breaker created so far, sorted by service name.
    pub async fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            snapshots.push(breaker.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    pub async fn open_count(&self) -> usize {
        self.snapshots()
            .await
            .iter()
            .filter(|s| s.state == CircuitState::Open)
            .count()
    }
}
