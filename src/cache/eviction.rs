//! Eviction Module
//!
//! Capacity policy and write-order tracking for bounded stores.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// == Eviction Policy ==
/// What a bounded store does when a new key arrives at capacity.
///
/// Expired entries are always purged before the policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Drop the entry written longest ago
    #[default]
    EvictOldest,
    /// Refuse the new key; overwrites of existing keys still succeed
    RejectNew,
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evict-oldest" | "evict_oldest" => Ok(EvictionPolicy::EvictOldest),
            "reject-new" | "reject_new" => Ok(EvictionPolicy::RejectNew),
            other => Err(format!("unknown eviction policy: {other}")),
        }
    }
}

// == Write Order ==
/// Tracks keys by last write time.
///
/// - Front = most recently written
/// - Back = oldest write
///
/// Reads do not reorder: a key's age only resets when it is written again,
/// so the last live slot is always the stalest entry.
///
/// Each write stamps the key with a generation. Rewrites and removals only
/// update `live`, leaving the old queue slot behind as a tombstone that
/// `pop_oldest` skips. Writes and removals are O(1); the queue is compacted
/// once tombstones outnumber live keys, keeping that cost amortized O(1).
#[derive(Debug, Default)]
pub struct WriteOrder {
    order: VecDeque<(String, u64)>,
    live: HashMap<String, u64>,
    generation: u64,
}

impl WriteOrder {
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Write ==
    /// Moves `key` to the front, inserting it if new.
    pub fn record_write(&mut self, key: &str) {
        self.generation += 1;
        self.live.insert(key.to_string(), self.generation);
        self.order.push_front((key.to_string(), self.generation));
        self.compact_if_sparse();
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if self.live.remove(key).is_some() {
            self.compact_if_sparse();
        }
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest written key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        while let Some((key, generation)) = self.order.pop_back() {
            if self.live.get(&key) == Some(&generation) {
                self.live.remove(&key);
                return Some(key);
            }
        }
        None
    }

    pub fn peek_oldest(&self) -> Option<&str> {
        self.order
            .iter()
            .rev()
            .find(|(key, generation)| self.is_live(key, *generation))
            .map(|(key, _)| key.as_str())
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.live.clear();
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn is_live(&self, key: &str, generation: u64) -> bool {
        self.live.get(key) == Some(&generation)
    }

    fn compact_if_sparse(&mut self) {
        if self.order.len() > 2 * self.live.len() + 16 {
            let live = &self.live;
            self.order
                .retain(|(key, generation)| live.get(key) == Some(generation));
        }
    }
}
