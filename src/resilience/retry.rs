//! Retry with exponential backoff for transient remote failures.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::resilience::backoff::{exponential_delay, jitter};

/// Tells the retry loop how to treat an error.
pub trait RetryClassify {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;

    /// Network or DNS failures, which get a longer backoff.
    fn is_network(&self) -> bool {
        false
    }
}

/// Attempt limits and delays for `retry_with_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Extra factor applied to the delay after network/DNS errors
    pub network_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            network_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed 1-based attempt.
    pub fn delay_after<E: RetryClassify>(&self, attempt: u32, error: &E) -> Duration {
        let base = exponential_delay(self.initial_delay, attempt).mul_f64(jitter());
        if error.is_network() {
            base.mul_f64(self.network_multiplier.max(1.0))
        } else {
            base
        }
    }
}

/// Runs `operation` up to `policy.max_attempts` times.
///
/// Non-retryable errors are returned after the first attempt. When attempts
/// run out the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassify + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            warn!(attempt, error = %error, "Non-retryable error, giving up");
            return Err(error);
        }

        if attempt >= max_attempts {
            error!(attempts = attempt, error = %error, "Exhausted all retry attempts");
            return Err(error);
        }

        let delay = policy.delay_after(attempt, &error);
        if error.is_network() {
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Network/DNS error, retrying with extended backoff"
            );
        } else {
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient error, retrying"
            );
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug)]
    enum TestError {
        Status(u16),
        Dns,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Status(code) => write!(f, "HTTP {code}"),
                TestError::Dns => write!(f, "dns failure"),
            }
        }
    }

    impl RetryClassify for TestError {
        fn is_retryable(&self) -> bool {
            match self {
                TestError::Status(code) => !(400..500).contains(code) || *code == 429,
                TestError::Dns => true,
            }
        }

        fn is_network(&self) -> bool {
            matches!(self, TestError::Dns)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result: Result<(), _> = retry_with_backoff(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Status(404))
        })
        .await;

        assert!(matches!(result, Err(TestError::Status(404))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_until_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let result: Result<(), _> = retry_with_backoff(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Status(429))
        })
        .await;

        assert!(matches!(result, Err(TestError::Status(429))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_server_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let start = Instant::now();

        let result = retry_with_backoff(&policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TestError::Status(500))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms, each scaled by jitter >= 0.8
        assert!(start.elapsed() >= Duration::from_millis(240));
        assert!(start.elapsed() <= Duration::from_millis(361));
    }

    #[test]
    fn test_network_errors_back_off_longer() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            network_multiplier: 3.0,
        };

        let dns = policy.delay_after(1, &TestError::Dns);
        let server = policy.delay_after(1, &TestError::Status(503));
        // 100ms * [0.8,1.2] * 3 versus 100ms * [0.8,1.2]
        assert!(dns >= Duration::from_millis(240));
        assert!(server <= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(1));

        let _: Result<(), _> = retry_with_backoff(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Status(500))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
