//! Scheduled background jobs
//!
//! Three long-lived tasks spawned at startup: the daily unconditional cache
//! refresh (safety net against missed invalidations), the daily conference
//! link health check, and the calendar statistic broadcasts (weekly on
//! Monday, monthly on the 1st, quarterly, yearly).

use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveTime, Weekday};
use std::time::Duration;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::stats::{self, Period};
use crate::dialogue::engine::Deps;
use crate::dialogue::texts;

/// Spawns all background jobs
pub fn spawn_all(deps: Deps) {
    tokio::spawn(cache_refresh_loop(deps.clone()));
    tokio::spawn(link_health_loop(deps.clone()));
    tokio::spawn(statistic_broadcast_loop(deps));
}

/// Unconditionally recomputes every cache key on a fixed interval
async fn cache_refresh_loop(deps: Deps) {
    let mut interval = tokio::time::interval(config::cache::refresh_interval());
    // the first tick of a tokio interval fires immediately, skip it
    interval.tick().await;
    loop {
        interval.tick().await;
        deps.cache.refresh_all().await;
    }
}

/// Seconds until the next local occurrence of `time`
fn until_next(time: NaiveTime) -> Duration {
    let now = Local::now().naive_local();
    let mut next = now.date().and_time(time);
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}

/// Checks the link generator daily; a failure means the page layout changed
/// and operations must fix the extraction
async fn link_health_loop(deps: Deps) {
    let at = NaiveTime::from_hms_opt(5, 1, 0).unwrap_or_default();
    loop {
        tokio::time::sleep(until_next(at)).await;
        match deps.links.conference_link().await {
            Ok(link) => log::info!("link health check passed: {}", link),
            Err(e) => {
                log::error!("link health check failed: {}", e);
                let _ = deps
                    .renderer
                    .send(*config::REQUESTS_CHAT_ID, texts::HTML_LAYOUT_CHANGED, None)
                    .await;
            }
        }
    }
}

/// Wakes shortly after midnight and fires whichever calendar broadcasts are
/// due that day
async fn statistic_broadcast_loop(deps: Deps) {
    let at = NaiveTime::from_hms_opt(0, 2, 0).unwrap_or_default();
    loop {
        tokio::time::sleep(until_next(at)).await;
        let today = Local::now().date_naive();
        if today.weekday() == Weekday::Mon {
            broadcast(&deps, Period::Week, "неделя").await;
        }
        if today.day() == 1 {
            broadcast(&deps, Period::Month, "месяц").await;
            if matches!(today.month(), 1 | 4 | 7 | 10) {
                broadcast(&deps, Period::Quarter, "квартал").await;
            }
            if today.month() == 1 {
                broadcast(&deps, Period::Year, "год").await;
            }
        }
    }
}

async fn broadcast(deps: &Deps, period: Period, hashtag: &str) {
    if let Err(e) = send_statistic(deps, period, hashtag).await {
        log::error!("statistic broadcast ({}) failed: {}", period.as_str(), e);
    }
}

/// Computes the canned-period report and posts it to the statistic channel
pub async fn send_statistic(deps: &Deps, period: Period, hashtag: &str) -> AppResult<()> {
    let end = Local::now().naive_local();
    let start = period.subtract_from(end);
    let prev_start = period.subtract_from(start);
    let report = stats::collect(deps.directory.as_ref(), start, end, Some(prev_start)).await?;
    let text = texts::statistic(&report, texts::period_caption(period), Some(hashtag));
    deps.renderer.send(*config::STATISTIC_CHAT_ID, &text, None).await?;
    log::info!("statistic broadcast ({}) sent", period.as_str());
    Ok(())
}
