//! Sharded in-memory backend with life-window expiry.
//!
//! Entries live for the configured life window regardless of the per-call
//! TTL; that approximation is part of the store contract. Expired entries
//! are dropped lazily on read and swept from a shard when it grows past
//! its share of the configured entry budget.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use crate::{StoreError, StoreResult, TokenStore};

/// Configuration for the in-memory backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Number of shards; rounded up to a power of two.
    pub shards: usize,
    /// Seconds an entry stays alive.
    pub life_window_secs: u64,
    /// Soft cap on total entries, used to size the sweep threshold.
    pub max_entries: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            shards: 64,
            life_window_secs: 24 * 60 * 60,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    blob: Vec<u8>,
    stored_at: Instant,
}

/// Sharded in-memory token cache.
#[derive(Debug)]
pub struct MemoryStore {
    shards: Vec<RwLock<HashMap<String, Entry>>>,
    shard_mask: usize,
    life_window: Duration,
    sweep_threshold: usize,
}

impl MemoryStore {
    /// Build the store from its configuration.
    pub fn new(config: MemoryStoreConfig) -> Self {
        let shard_count = config.shards.max(1).next_power_of_two();
        let shards = (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            shard_mask: shard_count - 1,
            life_window: Duration::from_secs(config.life_window_secs.max(1)),
            sweep_threshold: (config.max_entries.max(shard_count) / shard_count).max(8),
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, Entry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) & self.shard_mask]
    }

    fn expired(&self, entry: &Entry) -> bool {
        entry.stored_at.elapsed() > self.life_window
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn put(&self, key: &str, blob: &[u8], _ttl: Option<Duration>) -> StoreResult<()> {
        let shard = self.shard(key);
        let mut map = shard.write();
        if map.len() >= self.sweep_threshold {
            let life_window = self.life_window;
            map.retain(|_, entry| entry.stored_at.elapsed() <= life_window);
        }
        map.insert(
            key.to_string(),
            Entry {
                blob: blob.to_vec(),
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let shard = self.shard(key);
        {
            let map = shard.read();
            match map.get(key) {
                Some(entry) if !self.expired(entry) => return Ok(entry.blob.clone()),
                Some(_) => {}
                None => return Err(StoreError::NotFound),
            }
        }
        // Entry exists but has aged out; drop it.
        shard.write().remove(key);
        Err(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.shard(key).write().remove(key);
        Ok(())
    }
}
