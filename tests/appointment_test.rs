//! Appointment booking flow: offline and online branches
//!
//! Run with: cargo test --test appointment_test

mod common;

use common::{Harness, RenderCall, REQUESTS_CHAT};
use doctoria::dialogue::render::Markup;
use doctoria::dialogue::texts;
use doctoria::storage::directory::{CommunicationType, ConsultationType};
use pretty_assertions::assert_eq;

const CLIENT: i64 = 50;

#[tokio::test]
async fn offline_branch_completes_without_payment() {
    let h = Harness::new();

    h.press(CLIENT, "appointment:start").await;
    h.press(CLIENT, "cons:offline").await;
    h.text(CLIENT, "Нужен терапевт").await;
    h.press(CLIENT, "no").await;
    h.press(CLIENT, "com:call").await;
    h.text(CLIENT, "8 (926) 123-45-67").await;
    h.text(CLIENT, "петров петр").await;

    assert!(!h.session_exists(CLIENT).await);
    let state = h.directory.state.lock().await;
    assert_eq!(state.appointments.len(), 1);
    let booking = &state.appointments[0];
    assert_eq!(booking.consultation, ConsultationType::Offline);
    assert_eq!(booking.communication, CommunicationType::Call);
    assert_eq!(booking.phone.as_deref(), Some("79261234567"));
    assert_eq!(booking.request, "Нужен терапевт");
    assert_eq!(booking.full_name, "Петров Петр");
    assert_eq!(booking.doctor_id, None);
    drop(state);

    // the request card went to the administrators, no invoice was issued
    let requests = h.renderer.texts_for(REQUESTS_CHAT).await;
    assert!(requests.iter().any(|t| t.contains("Запись")));
    let calls = h.renderer.calls().await;
    assert!(!calls.iter().any(|c| matches!(c, RenderCall::Invoice { .. })));
}

#[tokio::test]
async fn invalid_phone_reprompts_in_place() {
    let h = Harness::new();

    h.press(CLIENT, "appointment:start").await;
    h.press(CLIENT, "cons:offline").await;
    h.text(CLIENT, "Массаж").await;
    h.press(CLIENT, "no").await;
    h.press(CLIENT, "com:call").await;
    h.text(CLIENT, "12345").await;

    assert!(h.session_exists(CLIENT).await);
    let texts_shown = h.renderer.texts_for(CLIENT).await;
    assert!(texts_shown.last().unwrap().contains("корректный номер"));
    assert!(h.directory.state.lock().await.appointments.is_empty());
}

fn nav_row(markup: &Markup) -> Vec<String> {
    markup
        .rows
        .iter()
        .rev()
        .nth(1)
        .map(|row| row.iter().map(|b| b.data.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn speciality_catalog_paginates_with_position_dependent_controls() {
    let h = Harness::new();
    for i in 0..25 {
        h.directory.add_speciality(&format!("Специальность {i}")).await;
    }

    h.press(CLIENT, "appointment:start").await;
    h.press(CLIENT, "cons:online").await;
    let markup = h.renderer.last_markup_for(CLIENT).await.unwrap();
    assert_eq!(nav_row(&markup), vec!["nav:1"]);

    h.press(CLIENT, "nav:1").await;
    let markup = h.renderer.last_markup_for(CLIENT).await.unwrap();
    assert_eq!(nav_row(&markup), vec!["nav:0", "nav:2"]);
    // the middle page shows items [10, 20)
    assert_eq!(markup.rows[0][0].data, "spec:10");

    h.press(CLIENT, "nav:2").await;
    let markup = h.renderer.last_markup_for(CLIENT).await.unwrap();
    assert_eq!(nav_row(&markup), vec!["nav:1"]);
}

async fn drive_online_to_payment(h: &Harness, doctor: i64) {
    h.press(CLIENT, "appointment:start").await;
    h.press(CLIENT, "cons:online").await;
    h.press(CLIENT, "spec:0").await;
    h.press_as(CLIENT, &format!("doc:{doctor}"), "client").await;
    h.press(CLIENT, "yes").await;
    h.text(CLIENT, "завтра после 10:00").await;
    h.press_as(CLIENT, "com:chat", "client").await;
    h.text(CLIENT, "петров петр").await;
    h.press(CLIENT, "pay").await;
}

#[tokio::test]
async fn online_branch_invoices_the_speciality_price_and_relays_the_link() {
    let h = Harness::new();
    let doctor = h.directory.add_doctor("Иванов Иван Иванович", vec![("Терапевт", 1500)]).await;

    drive_online_to_payment(&h, doctor).await;

    let calls = h.renderer.calls().await;
    let invoice = calls
        .iter()
        .find_map(|c| match c {
            RenderCall::Invoice { amount_minor, payload, .. } => Some((*amount_minor, payload.clone())),
            _ => None,
        })
        .expect("invoice issued");
    assert_eq!(invoice, (150000, "online_appointment".to_string()));
    // nothing is persisted until the payment is confirmed
    assert!(h.directory.state.lock().await.appointments.is_empty());

    h.payment(CLIENT, "charge-1", "online_appointment").await;

    assert!(!h.session_exists(CLIENT).await);
    let state = h.directory.state.lock().await;
    assert_eq!(state.appointments.len(), 1);
    let booking = &state.appointments[0];
    assert_eq!(booking.consultation, ConsultationType::Online);
    assert_eq!(booking.communication, CommunicationType::Chat);
    assert_eq!(booking.doctor_id, Some(doctor));
    assert_eq!(booking.request, "Иванов Иван Иванович");
    assert_eq!(booking.preferred_at.as_deref(), Some("завтра после 10:00"));
    drop(state);

    let texts_shown = h.renderer.texts_for(CLIENT).await;
    assert!(texts_shown.iter().any(|t| t.contains("https://jazz.sber.ru/abc123")));
    // the admin-channel card was updated with the payment details
    let requests = h.renderer.texts_for(REQUESTS_CHAT).await;
    assert!(requests.iter().any(|t| t.contains("charge-1")));
}

#[tokio::test]
async fn link_failure_still_completes_the_booking() {
    let h = Harness::with_links(None);
    let doctor = h.directory.add_doctor("Иванов Иван Иванович", vec![("Терапевт", 1500)]).await;

    drive_online_to_payment(&h, doctor).await;
    h.payment(CLIENT, "charge-2", "online_appointment").await;

    // the booking exists even though the link provider failed
    assert!(!h.session_exists(CLIENT).await);
    assert_eq!(h.directory.state.lock().await.appointments.len(), 1);
    // operations were alerted
    let requests = h.renderer.texts_for(REQUESTS_CHAT).await;
    assert!(requests.iter().any(|t| t == texts::HTML_LAYOUT_CHANGED));
}

#[tokio::test]
async fn foreign_payment_payloads_are_ignored() {
    let h = Harness::new();
    let doctor = h.directory.add_doctor("Иванов Иван Иванович", vec![("Терапевт", 1500)]).await;

    drive_online_to_payment(&h, doctor).await;
    h.payment(CLIENT, "charge-3", "something_else").await;

    // the session stays in the payment state, nothing is persisted
    assert!(h.session_exists(CLIENT).await);
    assert!(h.directory.state.lock().await.appointments.is_empty());
}

#[tokio::test]
async fn chat_without_username_falls_back_to_phone() {
    let h = Harness::new();
    let doctor = h.directory.add_doctor("Иванов Иван Иванович", vec![("Терапевт", 1500)]).await;

    h.press(CLIENT, "appointment:start").await;
    h.press(CLIENT, "cons:online").await;
    h.press(CLIENT, "spec:0").await;
    h.press(CLIENT, &format!("doc:{doctor}")).await;
    h.press(CLIENT, "no").await;
    // no username on the button press: the flow asks for a phone instead
    h.press(CLIENT, "com:chat").await;

    let texts_shown = h.renderer.texts_for(CLIENT).await;
    assert!(texts_shown.last().unwrap().contains("отсутствует @username"));

    h.text(CLIENT, "89261234567").await;
    let texts_shown = h.renderer.texts_for(CLIENT).await;
    assert!(texts_shown.last().unwrap().contains("Введите ваше имя"));
}
