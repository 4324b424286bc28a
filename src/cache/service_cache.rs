//! Service Cache Module
//!
//! Process-wide cache partitioned by category. Each partition is a
//! `TtlStore` behind its own lock; every read is reported to the monitor.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{
    AdaptiveTtlPolicy, CacheCategory, CacheMonitor, CacheSlot, EvictionPolicy, Lookup, SetOutcome,
    TtlProfile, TtlStore,
};
use crate::config::CacheConfig;

/// Category-partitioned cache of remote payloads.
#[derive(Debug)]
pub struct ServiceCache {
    stores: [RwLock<TtlStore<Value>>; 3],
    base_ttls: [Duration; 3],
    monitor: Arc<CacheMonitor>,
}

impl ServiceCache {
    pub fn new(config: &CacheConfig, monitor: Arc<CacheMonitor>) -> Self {
        let store = |category: CacheCategory| {
            let settings = config.category(category);
            RwLock::new(TtlStore::new(
                settings.ttl,
                settings.max_keys,
                config.eviction_policy,
            ))
        };
        let ttl = |category: CacheCategory| config.category(category).ttl;

        Self {
            stores: [
                store(CacheCategory::Package),
                store(CacheCategory::Courses),
                store(CacheCategory::Enrollment),
            ],
            base_ttls: [
                ttl(CacheCategory::Package),
                ttl(CacheCategory::Courses),
                ttl(CacheCategory::Enrollment),
            ],
            monitor,
        }
    }

    /// Same TTL for every category, unbounded. Handy in tests.
    pub fn with_ttl(ttl: Duration, monitor: Arc<CacheMonitor>) -> Self {
        let mut config = CacheConfig::default();
        for settings in [
            &mut config.package,
            &mut config.courses,
            &mut config.enrollment,
        ] {
            settings.ttl = ttl;
            settings.max_keys = None;
        }
        config.eviction_policy = EvictionPolicy::EvictOldest;
        Self::new(&config, monitor)
    }

    fn store(&self, category: CacheCategory) -> &RwLock<TtlStore<Value>> {
        &self.stores[category.index()]
    }

    pub fn monitor(&self) -> &Arc<CacheMonitor> {
        &self.monitor
    }

    // == Get ==
    /// Returns a fresh cached value, recording a hit or miss.
    pub async fn get(&self, category: CacheCategory, id: &str) -> Option<Value> {
        self.get_slot(category, CacheSlot::Id(id)).await
    }

    /// Reads take the shared lock; the exclusive lock is only taken to drop
    /// an expired entry.
    pub async fn get_slot(&self, category: CacheCategory, slot: CacheSlot<'_>) -> Option<Value> {
        let key = category.slot_key(slot);
        let lookup = self.store(category).read().await.peek(&key);
        let value = match lookup {
            Lookup::Fresh(value) => Some(value),
            Lookup::Absent => None,
            // Re-checked under the write lock in case of a concurrent refresh
            Lookup::Expired => self.store(category).write().await.get(&key),
        };

        match value {
            Some(value) => {
                self.monitor.record_hit(category);
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            None => {
                self.monitor.record_miss(category);
                debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    // == Set ==
    /// Stores a value with the category's current TTL.
    ///
    /// Store failures are logged and counted as errors, never returned.
    pub async fn set(&self, category: CacheCategory, id: &str, value: Value) -> bool {
        self.set_slot(category, CacheSlot::Id(id), value, None).await
    }

    pub async fn set_with_ttl(
        &self,
        category: CacheCategory,
        id: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> bool {
        self.set_slot(category, CacheSlot::Id(id), value, ttl).await
    }

    pub async fn set_slot(
        &self,
        category: CacheCategory,
        slot: CacheSlot<'_>,
        value: Value,
        ttl: Option<Duration>,
    ) -> bool {
        let key = category.slot_key(slot);
        let result = self.store(category).write().await.set(&key, value, ttl);

        match result {
            Ok(SetOutcome::Evicted(evicted)) => {
                debug!(key = %key, evicted = %evicted, "Cache set evicted oldest entry");
                true
            }
            Ok(_) => true,
            Err(e) => {
                self.monitor.record_error(category);
                warn!(key = %key, error = %e, "Cache set failed, continuing without cache");
                false
            }
        }
    }

    // == Invalidate ==
    /// Removes one entry. Absent keys are a no-op.
    pub async fn invalidate(&self, category: CacheCategory, id: &str) -> bool {
        self.invalidate_slot(category, CacheSlot::Id(id)).await
    }

    pub async fn invalidate_slot(&self, category: CacheCategory, slot: CacheSlot<'_>) -> bool {
        let key = category.slot_key(slot);
        let removed = self.store(category).write().await.delete(&key);
        debug!(key = %key, removed, "Cache invalidate");
        removed
    }

    /// Removes every entry of `category` whose cached value matches.
    pub async fn invalidate_where<F>(&self, category: CacheCategory, predicate: F) -> usize
    where
        F: Fn(&Value) -> bool,
    {
        let removed = self
            .store(category)
            .write()
            .await
            .delete_entries_where(|_, value| predicate(value));
        debug!(category = %category, removed, "Cache invalidate by value");
        removed
    }

    /// Removes every entry of `category` whose id contains `pattern`.
    ///
    /// The `<category>:` prefix is not matched against, and aggregate slots
    /// are left alone.
    pub async fn invalidate_matching(&self, category: CacheCategory, pattern: &str) -> usize {
        let prefix = category.key("");
        let removed = self.store(category).write().await.delete_where(|key| {
            key.strip_prefix(prefix.as_str())
                .is_some_and(|id| id.contains(pattern))
        });
        debug!(category = %category, pattern, removed, "Cache pattern invalidate");
        removed
    }

    // == Flush ==
    pub async fn flush_category(&self, category: CacheCategory) -> usize {
        self.store(category).write().await.flush()
    }

    pub async fn flush_all(&self) -> usize {
        let mut removed = 0;
        for category in CacheCategory::ALL {
            removed += self.flush_category(category).await;
        }
        removed
    }

    // == Cleanup Expired ==
    /// Sweeps expired entries from every category.
    pub async fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        for store in &self.stores {
            removed += store.write().await.cleanup_expired();
        }
        removed
    }

    pub async fn entry_counts(&self) -> BTreeMap<CacheCategory, usize> {
        let mut counts = BTreeMap::new();
        for category in CacheCategory::ALL {
            counts.insert(category, self.store(category).read().await.len());
        }
        counts
    }

    // == Adaptive TTL ==
    /// Recomputes every category's TTL from its base TTL.
    pub async fn apply_ttl_profile(&self, policy: &AdaptiveTtlPolicy, profile: TtlProfile) {
        for category in CacheCategory::ALL {
            let ttl = policy.ttl_for(self.base_ttls[category.index()], profile);
            self.store(category).write().await.set_default_ttl(ttl);
        }
    }

    pub async fn current_ttl(&self, category: CacheCategory) -> Duration {
        self.store(category).read().await.default_ttl()
    }
}
