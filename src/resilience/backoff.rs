//! Backoff arithmetic shared by the retry wrapper and the rate-limit tracker.

use std::time::Duration;

use rand::Rng;

/// Lower bound of the jitter factor.
pub const JITTER_MIN: f64 = 0.8;
/// Upper bound of the jitter factor.
pub const JITTER_MAX: f64 = 1.2;

/// Random factor in `[0.8, 1.2]`.
pub fn jitter() -> f64 {
    rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX)
}

/// `initial * 2^(attempt-1)` for a 1-based attempt number, without jitter.
pub fn exponential_delay(initial: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    initial.saturating_mul(1u32 << exponent)
}

/// Rate-limit backoff in seconds for the n-th consecutive 429: `min(30, 2^n)`.
pub fn rate_limit_backoff_secs(consecutive_hits: u32) -> u64 {
    if consecutive_hits >= 5 {
        30
    } else {
        (1u64 << consecutive_hits).min(30)
    }
}
