//! Remote backend over redis with per-key TTL.
//!
//! The connection is probed with PING at startup (bounded by the connect
//! timeout) and every operation runs under a short operation timeout so a
//! stalled server cannot wedge the pipeline.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{effective_ttl, StoreError, StoreResult, TokenStore};

/// Configuration for the redis backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    /// `host:port` of the server.
    pub address: String,
    /// Optional AUTH password.
    pub password: Option<String>,
    /// Database index.
    pub db: i64,
    /// Default per-key TTL in seconds; 24 h when absent.
    pub ttl_secs: Option<u64>,
    /// Startup connection probe timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-operation timeout in seconds.
    pub op_timeout_secs: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            ttl_secs: None,
            connect_timeout_secs: 5,
            op_timeout_secs: 3,
        }
    }
}

impl RedisStoreConfig {
    fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}/{}", password, self.address, self.db),
            None => format!("redis://{}/{}", self.address, self.db),
        }
    }
}

/// Redis-backed token cache.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::MultiplexedConnection,
    default_ttl: Option<Duration>,
    op_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("default_ttl", &self.default_ttl)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl RedisStore {
    /// Connect and verify the server responds to PING.
    pub async fn connect(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|e| StoreError::Backend(format!("invalid redis configuration: {e}")))?;

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
        let mut conn = tokio::time::timeout(connect_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(|e| StoreError::Backend(format!("failed to connect to redis: {e}")))?;

        let _: String = tokio::time::timeout(connect_timeout, redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(|e| StoreError::Backend(format!("redis ping failed: {e}")))?;

        debug!(address = %config.address, db = config.db, "redis token store connected");

        Ok(Self {
            conn,
            default_ttl: config.ttl_secs.map(Duration::from_secs),
            op_timeout: Duration::from_secs(config.op_timeout_secs.max(1)),
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))?
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl TokenStore for RedisStore {
    async fn put(&self, key: &str, blob: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let ttl = effective_ttl(ttl, self.default_ttl);
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        self.bounded(async move { conn.set_ex::<_, _, ()>(key, blob, seconds).await })
            .await
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = self.bounded(async move { conn.get(key).await }).await?;
        value.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = self.bounded(async move { conn.del(key).await }).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.exists(key).await }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_building() {
        let plain = RedisStoreConfig::default();
        assert_eq!(plain.url(), "redis://127.0.0.1:6379/0");

        let authed = RedisStoreConfig {
            address: "cache.internal:6380".into(),
            password: Some("hunter2".into()),
            db: 3,
            ..Default::default()
        };
        assert_eq!(authed.url(), "redis://:hunter2@cache.internal:6380/3");
    }

    // Exercising the live contract needs a server; run with
    // `cargo test -- --ignored` against a local redis.
    #[tokio::test]
    #[ignore = "requires a running redis"]
    async fn live_roundtrip() {
        let store = RedisStore::connect(RedisStoreConfig::default()).await.unwrap();
        store.put("gantry:test:k", b"v", Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(store.get("gantry:test:k").await.unwrap(), b"v");
        assert!(store.exists("gantry:test:k").await.unwrap());
        store.delete("gantry:test:k").await.unwrap();
        assert!(matches!(store.get("gantry:test:k").await, Err(StoreError::NotFound)));
    }
}
