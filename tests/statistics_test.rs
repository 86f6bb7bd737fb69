//! Statistics flow: canned periods with change figures, custom periods
//! with absolute counts
//!
//! Run with: cargo test --test statistics_test

mod common;

use common::Harness;
use doctoria::dialogue::texts;
use doctoria::storage::directory::PrivilegeLevel;
use pretty_assertions::assert_eq;

const PRIV_ADMIN: i64 = 20;

async fn privileged_harness() -> Harness {
    let h = Harness::new();
    h.directory.add_admin(PRIV_ADMIN, "Старший", PrivilegeLevel::High).await;
    h
}

#[tokio::test]
async fn canned_period_reports_change_versus_previous_period() {
    let h = privileged_harness().await;
    // collect() queries: online, offline, callbacks, feedbacks, users,
    // then the previous period: online, offline, callbacks, users
    h.directory.script_counts(&[10, 5, 3, 2, 8, 5, 5, 3, 4]).await;

    h.press(PRIV_ADMIN, "stats:day").await;

    // canned periods never leave a session behind
    assert!(!h.session_exists(PRIV_ADMIN).await);
    let texts_shown = h.renderer.texts_for(PRIV_ADMIN).await;
    let report = texts_shown.last().unwrap();
    assert!(report.contains("за 24 ЧАСА"));
    assert!(report.contains("Онлайн консульт. = 10 ⇒ <b>+ 100%</b> ⬆"));
    assert!(report.contains("Очная консульт. = 5 ⇒ <b>+ 0%</b>"));
    assert!(report.contains("Обратная связь = 2"));
    assert!(report.contains("Новые польз-ли = 8 ⇒ <b>+ 100%</b> ⬆"));
}

#[tokio::test]
async fn custom_period_normalizes_order_and_skips_change() {
    let h = privileged_harness().await;

    h.press(PRIV_ADMIN, "stats:custom").await;
    assert!(h.session_exists(PRIV_ADMIN).await);

    h.directory.script_counts(&[1, 2, 3, 4, 5]).await;
    // dates arrive in the wrong order on purpose
    h.text(PRIV_ADMIN, "05-03-2024  01-02-2024").await;

    assert!(!h.session_exists(PRIV_ADMIN).await);
    let texts_shown = h.renderer.texts_for(PRIV_ADMIN).await;
    let report = texts_shown.last().unwrap();
    assert!(report.contains("01/02/2024 - 05/03/2024"));
    assert!(report.contains("Онлайн консульт. = 1"));
    assert!(report.contains("Очная консульт. = 2"));
    // absolute counts only: no trend arrows for a custom period
    assert!(!report.contains('⇒'));
}

#[tokio::test]
async fn malformed_period_reprompts_in_place() {
    let h = privileged_harness().await;

    h.press(PRIV_ADMIN, "stats:custom").await;
    h.text(PRIV_ADMIN, "вчера и сегодня").await;

    assert!(h.session_exists(PRIV_ADMIN).await);
    let texts_shown = h.renderer.texts_for(PRIV_ADMIN).await;
    assert_eq!(texts_shown.last().unwrap(), texts::ASK_PERIOD_AGAIN);
}

#[tokio::test]
async fn statistics_require_high_privilege() {
    let h = Harness::new();
    h.directory.add_admin(30, "Младший", PrivilegeLevel::Low).await;

    h.press(30, "stats:day").await;

    assert!(!h.session_exists(30).await);
    let texts_shown = h.renderer.texts_for(30).await;
    assert_eq!(texts_shown, vec![texts::LACK_OF_PRIVILEGES.to_string()]);
}

#[tokio::test]
async fn scheduled_broadcast_posts_to_the_statistic_channel() {
    let h = privileged_harness().await;
    h.directory.script_counts(&[4, 2, 1, 0, 3, 2, 2, 1, 3]).await;

    doctoria::schedule::send_statistic(&h.deps, doctoria::core::stats::Period::Week, "неделя")
        .await
        .unwrap();

    let broadcast = h.renderer.texts_for(common::STATISTIC_CHAT).await;
    assert_eq!(broadcast.len(), 1);
    assert!(broadcast[0].starts_with("#отчет #неделя #бот"));
    assert!(broadcast[0].contains("за НЕДЕЛЮ"));
}
