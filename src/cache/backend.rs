//! Cache backends
//!
//! The coordinator only needs get/set with a TTL. `MemoryCacheBackend` keeps
//! entries in-process for single-node deployments and tests;
//! `RedisCacheBackend` shares them across restarts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Errors of the cache layer itself. Backend errors trigger degraded mode
/// (direct source-of-truth reads); they never fail a flow on their own.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
    #[error("cache entry malformed: {0}")]
    Codec(String),
}

/// Cached reference-data value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    Ids(Vec<i64>),
    Titles(Vec<String>),
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    async fn set(&self, key: &str, value: &CacheValue, ttl: Duration) -> Result<(), CacheError>;
}

struct MemoryEntry {
    value: CacheValue,
    expires_at: Instant,
}

/// In-process cache with per-entry TTL
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

/// Redis-backed cache; values are stored as JSON blobs under a fixed prefix
pub struct RedisCacheBackend {
    manager: redis::aio::ConnectionManager,
}

impl RedisCacheBackend {
    pub fn new(manager: redis::aio::ConnectionManager) -> Self {
        Self { manager }
    }

    fn redis_key(key: &str) -> String {
        format!("doctoria:cache:{key}")
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(Self::redis_key(key))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        match raw {
            Some(blob) => {
                let value = serde_json::from_str(&blob).map_err(|e| CacheError::Codec(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &CacheValue, ttl: Duration) -> Result<(), CacheError> {
        let blob = serde_json::to_string(value).map_err(|e| CacheError::Codec(e.to_string()))?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::redis_key(key), blob, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }
}
