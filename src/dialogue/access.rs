//! Access predicates over the cached admin sets
//!
//! Evaluated fresh on every gated transition — never memoised per session —
//! so revoking an admin takes effect on their very next action. The master
//! admin passes unconditionally.

use crate::cache::{CacheCoordinator, CacheKey};
use crate::core::config;
use crate::core::error::AppResult;

/// Member of the admin set (or the master admin)
pub async fn is_admin(cache: &CacheCoordinator, user_id: i64) -> AppResult<bool> {
    if user_id == *config::MASTER_ADMIN {
        return Ok(true);
    }
    Ok(cache.read_ids(CacheKey::Admins).await?.contains(&user_id))
}

/// Member of the high-privilege admin set (or the master admin)
pub async fn is_privileged(cache: &CacheCoordinator, user_id: i64) -> AppResult<bool> {
    if user_id == *config::MASTER_ADMIN {
        return Ok(true);
    }
    Ok(cache.read_ids(CacheKey::PrivAdmins).await?.contains(&user_id))
}
