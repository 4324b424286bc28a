//! TTL Store Module
//!
//! Key-value storage with per-entry expiry and an optional capacity bound.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, EvictionPolicy, WriteOrder, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

// == Set Outcome ==
/// What a successful `set` did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    Inserted,
    Overwritten,
    /// Inserted after evicting the named key
    Evicted(String),
}

// == Lookup ==
/// Result of a read that leaves the store untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Fresh(V),
    /// Present but past its TTL; a mutable `get` will remove it
    Expired,
    Absent,
}

// == TTL Store ==
/// Storage with lazy TTL enforcement.
///
/// Expired entries are treated as absent on read even before the background
/// sweep removes them.
#[derive(Debug)]
pub struct TtlStore<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: WriteOrder,
    max_keys: Option<usize>,
    policy: EvictionPolicy,
    default_ttl: Duration,
}

impl<V: Clone> TtlStore<V> {
    // == Constructor ==
    pub fn new(default_ttl: Duration, max_keys: Option<usize>, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            order: WriteOrder::new(),
            max_keys,
            policy,
            default_ttl,
        }
    }

    /// Unbounded store.
    pub fn unbounded(default_ttl: Duration) -> Self {
        Self::new(default_ttl, None, EvictionPolicy::EvictOldest)
    }

    // == Set ==
    /// Stores a value, overwriting any previous entry and resetting its age.
    ///
    /// `ttl` falls back to the store's default TTL.
    pub fn set(&mut self, key: &str, value: V, ttl: Option<Duration>) -> Result<SetOutcome> {
        validate_key(key)?;

        let is_overwrite = self.entries.contains_key(key);
        let mut evicted = None;

        if !is_overwrite {
            if let Some(max_keys) = self.max_keys {
                if self.entries.len() >= max_keys {
                    self.cleanup_expired();
                }
                if self.entries.len() >= max_keys {
                    match self.policy {
                        EvictionPolicy::EvictOldest => {
                            let oldest = self
                                .order
                                .pop_oldest()
                                .ok_or(CacheError::CapacityExceeded { max_keys })?;
                            self.entries.remove(&oldest);
                            debug!(key = %oldest, "Evicted oldest cache entry");
                            evicted = Some(oldest);
                        }
                        EvictionPolicy::RejectNew => {
                            return Err(CacheError::CapacityExceeded { max_keys });
                        }
                    }
                }
            }
        }

        let entry = CacheEntry::new(value, ttl.unwrap_or(self.default_ttl));
        self.entries.insert(key.to_string(), entry);
        self.order.record_write(key);

        Ok(match (is_overwrite, evicted) {
            (true, _) => SetOutcome::Overwritten,
            (false, Some(evicted)) => SetOutcome::Evicted(evicted),
            (false, None) => SetOutcome::Inserted,
        })
    }

    // == Get ==
    /// Returns the value if present and fresh. Expired entries are removed.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.remove_entry(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Read-only lookup. Expired entries are reported, not removed.
    pub fn peek(&self, key: &str) -> Lookup<V> {
        match self.entries.get(key) {
            None => Lookup::Absent,
            Some(entry) if entry.is_expired() => Lookup::Expired,
            Some(entry) => Lookup::Fresh(entry.value.clone()),
        }
    }

    /// Like `get` but also returns the remaining TTL.
    pub fn get_with_ttl(&mut self, key: &str) -> Option<(V, Duration)> {
        let value = self.get(key)?;
        let remaining = self.entries.get(key)?.ttl_remaining();
        Some((value, remaining))
    }

    // == Delete ==
    /// Removes a key. Returns whether anything was removed; absent keys are a no-op.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Delete Matching ==
    /// Removes every key containing `pattern`. Returns the number removed.
    pub fn delete_matching(&mut self, pattern: &str) -> usize {
        self.delete_where(|key| key.contains(pattern))
    }

    /// Removes every key accepted by `predicate`. Returns the number removed.
    pub fn delete_where<F: Fn(&str) -> bool>(&mut self, predicate: F) -> usize {
        self.delete_entries_where(|key, _| predicate(key))
    }

    /// Removes every entry whose key and value are accepted by `predicate`.
    /// Expired entries are tested too.
    pub fn delete_entries_where<F: Fn(&str, &V) -> bool>(&mut self, predicate: F) -> usize {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| predicate(key.as_str(), &entry.value))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matching {
            self.remove_entry(key);
        }
        matching.len()
    }

    // == Flush ==
    /// Removes all entries. Returns the number removed.
    pub fn flush(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        count
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }
        expired_keys.len()
    }

    // == Default TTL ==
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Changes the TTL used by later writes; existing entries keep theirs.
    pub fn set_default_ttl(&mut self, ttl: Duration) {
        self.default_ttl = ttl;
    }

    pub fn max_keys(&self) -> Option<usize> {
        self.max_keys
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.remove(key);
        }
        removed
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
