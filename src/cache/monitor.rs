//! Cache Monitor Module
//!
//! Per-category hit/miss/error/API-call counters plus the adaptive TTL rule
//! that reads them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheCategory;

// == Category Counters ==
#[derive(Debug, Default)]
struct CategoryCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    api_calls: AtomicU64,
}

impl CategoryCounters {
    fn snapshot(&self) -> CategoryStats {
        CategoryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.api_calls.store(0, Ordering::Relaxed);
    }
}

/// Counter values for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub api_calls: u64,
}

impl CategoryStats {
    /// `round(hits / (hits + misses) * 100)`, 0 when nothing was requested.
    pub fn hit_rate_percentage(&self) -> u64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0
        } else {
            (self.hits as f64 / total as f64 * 100.0).round() as u64
        }
    }
}

/// Read-only statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub categories: BTreeMap<CacheCategory, CategoryStats>,
    pub hit_rate_percentage: BTreeMap<CacheCategory, u64>,
    pub rate_limit_events: u64,
    pub total_requests: u64,
    pub last_reset: DateTime<Utc>,
}

impl CacheStatsSnapshot {
    pub fn category(&self, category: CacheCategory) -> CategoryStats {
        self.categories.get(&category).copied().unwrap_or_default()
    }
}

// == Cache Monitor ==
/// Lock-free counters shared by the cache, the gateway and the rate limiter.
#[derive(Debug)]
pub struct CacheMonitor {
    categories: [CategoryCounters; 3],
    rate_limit_events: AtomicU64,
    total_requests: AtomicU64,
    last_reset_ms: AtomicI64,
}

impl CacheMonitor {
    pub fn new() -> Self {
        Self {
            categories: Default::default(),
            rate_limit_events: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            last_reset_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    fn counters(&self, category: CacheCategory) -> &CategoryCounters {
        &self.categories[category.index()]
    }

    pub fn record_hit(&self, category: CacheCategory) {
        self.counters(category).hits.fetch_add(1, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, category: CacheCategory) {
        self.counters(category).misses.fetch_add(1, Ordering::Relaxed);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_call(&self, category: CacheCategory) {
        self.counters(category)
            .api_calls
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, category: CacheCategory) {
        self.counters(category).errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_event(&self) {
        self.rate_limit_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Hits plus misses since the last reset.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    // == Snapshot ==
    pub fn stats(&self) -> CacheStatsSnapshot {
        let categories: BTreeMap<_, _> = CacheCategory::ALL
            .iter()
            .map(|category| (*category, self.counters(*category).snapshot()))
            .collect();
        let hit_rate_percentage = categories
            .iter()
            .map(|(category, stats)| (*category, stats.hit_rate_percentage()))
            .collect();
        let last_reset = DateTime::from_timestamp_millis(self.last_reset_ms.load(Ordering::Relaxed))
            .unwrap_or_else(Utc::now);

        CacheStatsSnapshot {
            categories,
            hit_rate_percentage,
            rate_limit_events: self.rate_limit_events.load(Ordering::Relaxed),
            total_requests: self.total_requests(),
            last_reset,
        }
    }

    // == Reset ==
    /// Zeroes every counter. Operator action only.
    pub fn reset(&self) {
        for counters in &self.categories {
            counters.reset();
        }
        self.rate_limit_events.store(0, Ordering::Relaxed);
        self.total_requests.store(0, Ordering::Relaxed);
        self.last_reset_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

impl Default for CacheMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// == Adaptive TTL ==
/// Load level picked by the adaptive TTL rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlProfile {
    Normal,
    HighLoad,
}

/// Threshold rule: widen TTLs while the request rate stays above a limit.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveTtlPolicy {
    /// Hits plus misses per minute above which the load counts as high
    pub high_load_requests_per_minute: u64,
    /// TTL multiplier under high load
    pub high_load_multiplier: f64,
}

impl Default for AdaptiveTtlPolicy {
    fn default() -> Self {
        Self {
            high_load_requests_per_minute: 600,
            high_load_multiplier: 2.0,
        }
    }
}

impl AdaptiveTtlPolicy {
    /// Picks a profile from the requests observed over `elapsed`.
    pub fn evaluate(&self, requests: u64, elapsed: Duration) -> TtlProfile {
        if elapsed.is_zero() {
            return TtlProfile::Normal;
        }
        let per_minute = requests as f64 * 60.0 / elapsed.as_secs_f64();
        if per_minute > self.high_load_requests_per_minute as f64 {
            TtlProfile::HighLoad
        } else {
            TtlProfile::Normal
        }
    }

    /// Effective TTL for a category's base TTL under `profile`.
    pub fn ttl_for(&self, base: Duration, profile: TtlProfile) -> Duration {
        match profile {
            TtlProfile::Normal => base,
            TtlProfile::HighLoad => base.mul_f64(self.high_load_multiplier.max(1.0)),
        }
    }
}
