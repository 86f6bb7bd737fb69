//! Read-through cache in front of slow-changing reference data
//!
//! Three keys are cached: the admin id set, the privileged-admin id set and
//! the speciality catalog. A read always returns a value when the source of
//! truth can produce one: a miss is repopulated synchronously before
//! returning, and a broken backend degrades to querying the source directly.
//! Mutating flows invalidate the affected keys immediately; a daily full
//! refresh acts as a safety net against missed invalidations.

pub mod backend;

use std::sync::Arc;
use std::time::Duration;

pub use backend::{CacheBackend, CacheError, CacheValue, MemoryCacheBackend, RedisCacheBackend};

use crate::core::error::{AppError, AppResult};
use crate::storage::directory::{Directory, PrivilegeLevel};

/// Reference-data cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    Admins,
    PrivAdmins,
    Specialities,
}

impl CacheKey {
    pub const ALL: [CacheKey; 3] = [CacheKey::Admins, CacheKey::PrivAdmins, CacheKey::Specialities];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Admins => "admins",
            CacheKey::PrivAdmins => "priv_admins",
            CacheKey::Specialities => "specialities",
        }
    }
}

/// Read-through + explicit-invalidation coordinator
pub struct CacheCoordinator {
    backend: Arc<dyn CacheBackend>,
    directory: Arc<dyn Directory>,
    ttl: Duration,
}

impl CacheCoordinator {
    pub fn new(backend: Arc<dyn CacheBackend>, directory: Arc<dyn Directory>, ttl: Duration) -> Self {
        Self { backend, directory, ttl }
    }

    /// Reads a key, repopulating from the source of truth on a miss.
    ///
    /// Backend failures degrade to a direct source-of-truth query; a
    /// source-of-truth failure is propagated, never papered over with a
    /// stale or empty value.
    pub async fn read(&self, key: CacheKey) -> AppResult<CacheValue> {
        match self.backend.get(key.as_str()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                let value = self.compute(key).await?;
                if let Err(e) = self.backend.set(key.as_str(), &value, self.ttl).await {
                    log::warn!("cache set failed for {}: {}", key.as_str(), e);
                }
                Ok(value)
            }
            Err(e) => {
                log::warn!("cache backend unavailable, reading {} from source: {}", key.as_str(), e);
                self.compute(key).await
            }
        }
    }

    /// Reads an id-set key
    pub async fn read_ids(&self, key: CacheKey) -> AppResult<Vec<i64>> {
        match self.read(key).await? {
            CacheValue::Ids(ids) => Ok(ids),
            CacheValue::Titles(_) => Err(AppError::Cache(CacheError::Codec(format!(
                "expected ids under {}",
                key.as_str()
            )))),
        }
    }

    /// Reads the speciality catalog
    pub async fn read_titles(&self, key: CacheKey) -> AppResult<Vec<String>> {
        match self.read(key).await? {
            CacheValue::Titles(titles) => Ok(titles),
            CacheValue::Ids(_) => Err(AppError::Cache(CacheError::Codec(format!(
                "expected titles under {}",
                key.as_str()
            )))),
        }
    }

    /// Recomputes the given keys from the source of truth and overwrites the
    /// cached values. Called after every mutation of the underlying
    /// reference data.
    pub async fn invalidate(&self, keys: &[CacheKey]) -> AppResult<()> {
        for &key in keys {
            let value = self.compute(key).await?;
            if let Err(e) = self.backend.set(key.as_str(), &value, self.ttl).await {
                // the next read will degrade or recompute
                log::warn!("cache invalidation store failed for {}: {}", key.as_str(), e);
            }
        }
        Ok(())
    }

    /// Unconditional refresh of every known key (daily safety net)
    pub async fn refresh_all(&self) {
        if let Err(e) = self.invalidate(&CacheKey::ALL).await {
            log::error!("scheduled cache refresh failed: {}", e);
        } else {
            log::info!("scheduled cache refresh completed");
        }
    }

    async fn compute(&self, key: CacheKey) -> AppResult<CacheValue> {
        match key {
            CacheKey::Admins => Ok(CacheValue::Ids(self.directory.get_admin_ids(None).await?)),
            CacheKey::PrivAdmins => Ok(CacheValue::Ids(
                self.directory.get_admin_ids(Some(PrivilegeLevel::High)).await?,
            )),
            CacheKey::Specialities => Ok(CacheValue::Titles(self.directory.get_specialities().await?)),
        }
    }
}
