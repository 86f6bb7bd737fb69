//! Cache coordinator: read-through, invalidation, degraded mode
//!
//! Run with: cargo test --test cache_test

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::MockDirectory;
use doctoria::cache::{
    CacheBackend, CacheCoordinator, CacheError, CacheKey, CacheValue, MemoryCacheBackend,
};
use doctoria::storage::directory::{Directory, PrivilegeLevel};
use pretty_assertions::assert_eq;

fn coordinator(directory: Arc<MockDirectory>, ttl: Duration) -> CacheCoordinator {
    CacheCoordinator::new(Arc::new(MemoryCacheBackend::new()), directory, ttl)
}

#[tokio::test]
async fn read_populates_from_source_on_miss() {
    let directory = Arc::new(MockDirectory::new());
    directory.add_admin(1, "Один", PrivilegeLevel::High).await;
    directory.add_admin(2, "Два", PrivilegeLevel::Low).await;
    let cache = coordinator(directory.clone(), Duration::from_secs(3600));

    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), vec![1, 2]);
    assert_eq!(cache.read_ids(CacheKey::PrivAdmins).await.unwrap(), vec![1]);
}

#[tokio::test]
async fn read_serves_cached_value_until_invalidated() {
    let directory = Arc::new(MockDirectory::new());
    directory.add_admin(1, "Один", PrivilegeLevel::Low).await;
    let cache = coordinator(directory.clone(), Duration::from_secs(3600));

    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), vec![1]);

    // the directory drifts; the cached value is intentionally stale
    directory.add_admin(2, "Два", PrivilegeLevel::Low).await;
    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), vec![1]);

    // an explicit invalidation brings the next read in line with the source
    cache.invalidate(&[CacheKey::Admins]).await.unwrap();
    let fresh = directory.get_admin_ids(None).await.unwrap();
    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), fresh);
}

#[tokio::test]
async fn expired_entries_are_recomputed_synchronously() {
    let directory = Arc::new(MockDirectory::new());
    directory.add_speciality("Терапевт").await;
    let cache = coordinator(directory.clone(), Duration::ZERO);

    assert_eq!(cache.read_titles(CacheKey::Specialities).await.unwrap(), vec!["Терапевт"]);

    directory.add_speciality("Хирург").await;
    // zero TTL: every read recomputes, never serving an expired entry
    assert_eq!(
        cache.read_titles(CacheKey::Specialities).await.unwrap(),
        vec!["Терапевт", "Хирург"]
    );
}

/// A backend that is permanently down
struct BrokenBackend;

#[async_trait]
impl CacheBackend for BrokenBackend {
    async fn get(&self, _key: &str) -> Result<Option<CacheValue>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &CacheValue, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

#[tokio::test]
async fn broken_backend_degrades_to_direct_source_reads() {
    let directory = Arc::new(MockDirectory::new());
    directory.add_admin(7, "Семь", PrivilegeLevel::Low).await;
    let cache = CacheCoordinator::new(Arc::new(BrokenBackend), directory.clone(), Duration::from_secs(60));

    // correctness preserved, latency degraded
    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), vec![7]);
    directory.add_admin(8, "Восемь", PrivilegeLevel::Low).await;
    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), vec![7, 8]);
}

#[tokio::test]
async fn source_failure_is_propagated_not_masked() {
    let directory = Arc::new(MockDirectory::new());
    let cache = coordinator(directory.clone(), Duration::from_secs(60));
    directory.fail_reads.store(true, Ordering::SeqCst);

    assert!(cache.read_ids(CacheKey::Admins).await.is_err());
    assert!(cache.invalidate(&[CacheKey::Specialities]).await.is_err());
}

#[tokio::test]
async fn refresh_all_rewrites_every_key() {
    let directory = Arc::new(MockDirectory::new());
    directory.add_admin(1, "Один", PrivilegeLevel::High).await;
    directory.add_speciality("Терапевт").await;
    let cache = coordinator(directory.clone(), Duration::from_secs(3600));

    // warm with the initial values
    cache.read_ids(CacheKey::Admins).await.unwrap();
    cache.read_titles(CacheKey::Specialities).await.unwrap();

    directory.add_admin(2, "Два", PrivilegeLevel::Low).await;
    directory.add_speciality("Хирург").await;
    cache.refresh_all().await;

    assert_eq!(cache.read_ids(CacheKey::Admins).await.unwrap(), vec![1, 2]);
    assert_eq!(
        cache.read_titles(CacheKey::Specialities).await.unwrap(),
        vec!["Терапевт", "Хирург"]
    );
}
