//! Engine-level behaviour: event dropping, global cancel, access guards
//!
//! Run with: cargo test --test engine_test

mod common;

use common::{Harness, RenderCall};
use doctoria::dialogue::texts;
use doctoria::storage::directory::PrivilegeLevel;
use pretty_assertions::assert_eq;

const ADMIN: i64 = 10;
const CLIENT: i64 = 50;

#[tokio::test]
async fn stray_events_are_dropped_without_a_session() {
    let h = Harness::new();

    h.text(CLIENT, "привет").await;
    h.press(CLIENT, "spec:3").await;

    assert!(!h.session_exists(CLIENT).await);
    assert_eq!(h.renderer.calls().await, Vec::<RenderCall>::new());
}

#[tokio::test]
async fn unmatched_event_does_not_advance_the_conversation() {
    let h = Harness::new();
    h.press(CLIENT, "callback:start").await;
    let prompts_before = h.renderer.calls().await.len();

    // a button from a stale screen has no transition in the name state
    h.press(CLIENT, "qual:highest").await;

    assert!(h.session_exists(CLIENT).await);
    assert_eq!(h.renderer.calls().await.len(), prompts_before);
}

#[tokio::test]
async fn back_to_menu_cancels_from_any_state_without_partial_writes() {
    let h = Harness::new();
    h.press(common::MASTER_ADMIN, "admin:create").await;
    h.text(common::MASTER_ADMIN, "123456").await;
    assert!(h.session_exists(common::MASTER_ADMIN).await);

    h.press(common::MASTER_ADMIN, "menu:main").await;

    assert!(!h.session_exists(common::MASTER_ADMIN).await);
    assert!(h.directory.state.lock().await.admins.is_empty());
    let texts_shown = h.renderer.texts_for(common::MASTER_ADMIN).await;
    assert!(texts_shown.last().unwrap().contains("Добро пожаловать"));
}

#[tokio::test]
async fn privileged_sections_deny_plain_users() {
    let h = Harness::new();
    h.directory.add_admin(ADMIN, "Админ", PrivilegeLevel::Low).await;

    // a low-privilege admin may manage doctors but not statistics
    h.press(ADMIN, "menu:doctors").await;
    h.press(ADMIN, "menu:stats").await;

    let texts_shown = h.renderer.texts_for(ADMIN).await;
    assert!(texts_shown[0].contains("Добро пожаловать"));
    assert_eq!(texts_shown[1], texts::LACK_OF_PRIVILEGES);
}

#[tokio::test]
async fn flow_entry_is_denied_for_non_admins() {
    let h = Harness::new();

    h.press(CLIENT, "doctor:create").await;

    assert!(!h.session_exists(CLIENT).await);
    let texts_shown = h.renderer.texts_for(CLIENT).await;
    assert_eq!(texts_shown, vec![texts::LACK_OF_PRIVILEGES.to_string()]);
}

#[tokio::test]
async fn privilege_revocation_applies_on_the_next_gated_action() {
    let h = Harness::new();
    h.directory.add_admin(ADMIN, "Админ", PrivilegeLevel::Low).await;
    let doctor = h.directory.add_doctor("Иванов Иван", vec![("Терапевт", 1000)]).await;

    h.press(ADMIN, "doctor:delete").await;
    h.press(ADMIN, &format!("pick:{doctor}")).await;
    h.press(ADMIN, "done").await;

    // revoked between confirmation prompt and the commit press
    h.directory.state.lock().await.admins.clear();
    h.deps.cache.invalidate(&[doctoria::cache::CacheKey::Admins]).await.unwrap();

    h.press(ADMIN, "confirm").await;

    assert!(!h.session_exists(ADMIN).await);
    assert_eq!(h.directory.state.lock().await.doctors.len(), 1);
    let texts_shown = h.renderer.texts_for(ADMIN).await;
    assert_eq!(texts_shown.last().unwrap(), texts::LACK_OF_PRIVILEGES);
}

#[tokio::test]
async fn starting_a_new_flow_supersedes_the_old_session() {
    let h = Harness::new();
    h.press(CLIENT, "callback:start").await;
    assert!(h.session_exists(CLIENT).await);

    h.press(CLIENT, "feedback:start").await;

    let session = h.deps.sessions.get(CLIENT).await.unwrap().unwrap();
    assert_eq!(session.flow, doctoria::dialogue::FlowKind::Feedback);
}
