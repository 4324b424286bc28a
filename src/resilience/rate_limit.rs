//! Rate-limit backoff tracker.
//!
//! Remembers, per remote service, how long callers must hold off after HTTP
//! 429 responses. Independent of circuit state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::CacheMonitor;
use crate::resilience::backoff::{jitter, rate_limit_backoff_secs};

#[derive(Debug, Clone, Copy, Default)]
struct RateLimitState {
    consecutive_hits: u32,
    backoff_until: Option<Instant>,
}

/// Per-service 429 backoff windows.
#[derive(Debug)]
pub struct RateLimitTracker {
    states: Mutex<HashMap<String, RateLimitState>>,
    monitor: Arc<CacheMonitor>,
}

impl RateLimitTracker {
    pub fn new(monitor: Arc<CacheMonitor>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            monitor,
        }
    }

    /// Remaining backoff for `service`, if a window is active.
    pub async fn remaining(&self, service: &str) -> Option<Duration> {
        let states = self.states.lock().await;
        let until = states.get(service)?.backoff_until?;
        let remaining = until.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }

    // == Check And Wait ==
    /// Sleeps until the backoff window for `service` has passed. No-op otherwise.
    pub async fn check_and_wait(&self, service: &str) {
        if let Some(remaining) = self.remaining(service).await {
            info!(
                service,
                wait_ms = remaining.as_millis() as u64,
                "Waiting out rate-limit backoff"
            );
            tokio::time::sleep(remaining).await;
        }
    }

    // == On Rate Limited ==
    /// Records a 429 and opens (or extends) the backoff window.
    ///
    /// Uses `retry_after` when the server sent one, else `min(30, 2^hits)`
    /// seconds with jitter. Returns the chosen duration.
    pub async fn on_rate_limited(&self, service: &str, retry_after: Option<Duration>) -> Duration {
        let mut states = self.states.lock().await;
        let state = states.entry(service.to_string()).or_default();

        state.consecutive_hits = state.consecutive_hits.saturating_add(1);
        let duration = retry_after.unwrap_or_else(|| {
            Duration::from_secs(rate_limit_backoff_secs(state.consecutive_hits)).mul_f64(jitter())
        });

        let candidate = Instant::now() + duration;
        state.backoff_until = Some(match state.backoff_until {
            Some(current) if current > candidate => current,
            _ => candidate,
        });

        self.monitor.record_rate_limit_event();
        warn!(
            service,
            consecutive_hits = state.consecutive_hits,
            backoff_ms = duration.as_millis() as u64,
            from_header = retry_after.is_some(),
            "Rate limited by remote service"
        );
        duration
    }

    // == On Success ==
    /// Clears the hit streak once the window has elapsed and a call succeeded.
    pub async fn on_success(&self, service: &str) {
        let mut states = self.states.lock().await;
        if let Some(state) = states.get_mut(service) {
            let window_passed = state
                .backoff_until
                .map_or(true, |until| Instant::now() >= until);
            if window_passed && state.consecutive_hits > 0 {
                debug!(service, "Rate-limit streak reset");
                state.consecutive_hits = 0;
                state.backoff_until = None;
            }
        }
    }

    pub async fn consecutive_hits(&self, service: &str) -> u32 {
        self.states
            .lock()
            .await
            .get(service)
            .map_or(0, |state| state.consecutive_hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RateLimitTracker {
        RateLimitTracker::new(Arc::new(CacheMonitor::new()))
    }

    #[tokio::test]
    async fn test_no_window_is_noop() {
        let tracker = tracker();
        let start = Instant::now();
        tracker.check_and_wait("course-service").await;
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(tracker.remaining("course-service").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_window_with_jitter() {
        let tracker = tracker();

        let first = tracker.on_rate_limited("course-service", None).await;
        assert!(first >= Duration::from_millis(1600) && first <= Duration::from_millis(2400));

        let second = tracker.on_rate_limited("course-service", None).await;
        assert!(second >= Duration::from_millis(3200) && second <= Duration::from_millis(4800));
        assert_eq!(tracker.consecutive_hits("course-service").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_header_wins() {
        let tracker = tracker();

        let duration = tracker
            .on_rate_limited("package-service", Some(Duration::from_secs(7)))
            .await;
        assert_eq!(duration, Duration::from_secs(7));

        let start = Instant::now();
        tracker.check_and_wait("package-service").await;
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_never_shrinks() {
        let tracker = tracker();

        tracker
            .on_rate_limited("svc", Some(Duration::from_secs(20)))
            .await;
        tracker
            .on_rate_limited("svc", Some(Duration::from_secs(1)))
            .await;

        let remaining = tracker.remaining("svc").await.unwrap();
        assert!(remaining > Duration::from_secs(19));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_only_after_window() {
        let tracker = tracker();

        tracker
            .on_rate_limited("svc", Some(Duration::from_secs(5)))
            .await;
        tracker.on_success("svc").await;
        assert_eq!(tracker.consecutive_hits("svc").await, 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        tracker.on_success("svc").await;
        assert_eq!(tracker.consecutive_hits("svc").await, 0);
    }

    #[tokio::test]
    async fn test_records_monitor_event() {
        let monitor = Arc::new(CacheMonitor::new());
        let tracker = RateLimitTracker::new(monitor.clone());

        tracker
            .on_rate_limited("svc", Some(Duration::from_millis(1)))
            .await;
        assert_eq!(monitor.stats().rate_limit_events, 1);
    }
}
