//! Uniform key/value token cache over three backends.
//!
//! The store keeps opaque blobs under string keys with a TTL. Three
//! backends implement the same contract: a sharded in-memory cache with
//! life-window expiry, an embedded log-structured store (sled) with
//! per-key TTL, and a redis client with per-key TTL.
//!
//! Contract highlights:
//! - `put` is total and idempotent; it overwrites existing entries.
//! - `get` reports [`StoreError::NotFound`] for absent *and* expired keys;
//!   callers cannot distinguish the two.
//! - `delete` is idempotent; deleting an absent key succeeds.
//! - TTL resolution for per-key backends: per-call argument, then backend
//!   configuration, then 24 hours. The in-memory backend approximates TTL
//!   with its life window and ignores the per-call argument.

mod disk;
mod memory;
mod redis_store;

pub use disk::{DiskStore, DiskStoreConfig};
pub use memory::{MemoryStore, MemoryStoreConfig};
pub use redis_store::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Fallback TTL when neither the call nor the backend configures one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors reported by store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is absent or its entry has expired.
    #[error("key not found")]
    NotFound,
    /// The backend failed (I/O, network, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
    /// A bounded backend operation timed out.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Whether this error means the key is simply not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The uniform token cache contract.
#[async_trait]
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Store `blob` under `key`, overwriting any existing entry.
    ///
    /// `ttl` overrides the backend's configured TTL for this entry where
    /// the backend supports per-key expiry.
    async fn put(&self, key: &str, blob: &[u8], ttl: Option<Duration>) -> StoreResult<()>;

    /// Fetch the blob under `key`.
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Whether `key` currently resolves to an unexpired entry.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release backend resources. Idempotent.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Resolve the effective TTL: per-call, then backend config, then default.
pub(crate) fn effective_ttl(call: Option<Duration>, configured: Option<Duration>) -> Duration {
    call.or(configured).unwrap_or(DEFAULT_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_resolution_order() {
        let call = Some(Duration::from_secs(60));
        let configured = Some(Duration::from_secs(600));
        assert_eq!(effective_ttl(call, configured), Duration::from_secs(60));
        assert_eq!(effective_ttl(None, configured), Duration::from_secs(600));
        assert_eq!(effective_ttl(None, None), DEFAULT_TTL);
    }

    #[test]
    fn not_found_classification() {
        assert!(StoreError::NotFound.is_not_found());
        assert!(!StoreError::Backend("io".into()).is_not_found());
    }
}
