//! Embedded backend over sled with value-embedded TTL.
//!
//! sled has no native expiry, so every value is stored as
//! `[8-byte BE unix-millis deadline ‖ blob]`. Reads past the deadline
//! delete the entry and report it as absent, which keeps the uniform
//! NotFound contract.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::{effective_ttl, StoreError, StoreResult, TokenStore};

const DEADLINE_LEN: usize = 8;

/// Configuration for the embedded backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiskStoreConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Default per-key TTL in seconds; 24 h when absent.
    pub ttl_secs: Option<u64>,
    /// Open a purely in-memory database (tests, ephemeral deployments).
    pub temporary: bool,
}

impl Default for DiskStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/tokens"),
            ttl_secs: None,
            temporary: false,
        }
    }
}

/// Embedded log-structured token cache.
#[derive(Debug)]
pub struct DiskStore {
    db: sled::Db,
    default_ttl: Option<Duration>,
}

impl DiskStore {
    /// Open (or create) the database at the configured path.
    pub fn open(config: DiskStoreConfig) -> StoreResult<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.temporary)
            .open()
            .map_err(|e| StoreError::Backend(format!("failed to open store at {}: {e}", config.path.display())))?;

        debug!(path = %config.path.display(), "embedded token store opened");

        Ok(Self {
            db,
            default_ttl: config.ttl_secs.map(Duration::from_secs),
        })
    }

    fn encode(blob: &[u8], ttl: Duration) -> Vec<u8> {
        let deadline = now_millis().saturating_add(ttl.as_millis() as u64);
        let mut value = Vec::with_capacity(DEADLINE_LEN + blob.len());
        value.extend_from_slice(&deadline.to_be_bytes());
        value.extend_from_slice(blob);
        value
    }

    fn decode(value: &[u8]) -> Option<(u64, &[u8])> {
        if value.len() < DEADLINE_LEN {
            return None;
        }
        let mut deadline = [0u8; DEADLINE_LEN];
        deadline.copy_from_slice(&value[..DEADLINE_LEN]);
        Some((u64::from_be_bytes(deadline), &value[DEADLINE_LEN..]))
    }
}

#[async_trait]
impl TokenStore for DiskStore {
    async fn put(&self, key: &str, blob: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let ttl = effective_ttl(ttl, self.default_ttl);
        self.db
            .insert(key.as_bytes(), Self::encode(blob, ttl))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound)?;

        match Self::decode(&value) {
            Some((deadline, blob)) if deadline > now_millis() => Ok(blob.to_vec()),
            Some(_) => {
                // Deadline passed; prune and report absent.
                if let Err(e) = self.db.remove(key.as_bytes()) {
                    warn!(error = %e, "failed to prune expired entry");
                }
                Err(StoreError::NotFound)
            }
            None => {
                warn!("corrupt entry dropped from embedded store");
                let _ = self.db.remove(key.as_bytes());
                Err(StoreError::NotFound)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
