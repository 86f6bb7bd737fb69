//! Shared test fixtures: in-memory fakes for the dialogue core's ports

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use doctoria::cache::{CacheCoordinator, MemoryCacheBackend};
use doctoria::core::error::{AppError, AppResult};
use doctoria::dialogue::render::{LinkProvider, Markup, PaymentGateway, Renderer};
use doctoria::dialogue::{Deps, Dispatcher, Event, MessagePayload, MemorySessionStore};
use doctoria::storage::directory::{
    AdminRecord, ConsultationType, DateRange, Directory, Doctor, DoctorField, NewAppointment, NewCallback,
    NewDoctor, NewFeedback, PrivilegeLevel, SpecialityPrice, StatTable,
};

/// Master admin uid used across all tests; set before any config access
pub const MASTER_ADMIN: i64 = 999;
pub const REQUESTS_CHAT: i64 = -1000;
pub const STATISTIC_CHAT: i64 = -2000;

/// Pins the environment-driven config statics to known values. Must be the
/// first call of every test (the statics latch on first access).
pub fn setup_env() {
    std::env::set_var("MASTER_ADMIN", MASTER_ADMIN.to_string());
    std::env::set_var("REQUESTS_CHAT_ID", REQUESTS_CHAT.to_string());
    std::env::set_var("STATISTIC_CHAT_ID", STATISTIC_CHAT.to_string());
}

// ---------------------------------------------------------------------------
// Directory fake

#[derive(Default)]
pub struct DirectoryState {
    pub admins: Vec<AdminRecord>,
    pub specialities: Vec<String>,
    pub doctors: Vec<Doctor>,
    pub appointments: Vec<NewAppointment>,
    pub callbacks: Vec<NewCallback>,
    pub feedbacks: Vec<NewFeedback>,
    pub next_doctor_id: i64,
    /// Scripted answers for count_records, popped per call
    pub counts: VecDeque<i64>,
}

#[derive(Default)]
pub struct MockDirectory {
    pub state: Mutex<DirectoryState>,
    /// When set, reference-data reads fail (source-of-truth outage)
    pub fail_reads: AtomicBool,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState { next_doctor_id: 1, ..DirectoryState::default() }),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub async fn add_admin(&self, user_id: i64, full_name: &str, privilege: PrivilegeLevel) {
        self.state.lock().await.admins.push(AdminRecord {
            user_id,
            full_name: full_name.to_string(),
            privilege,
        });
    }

    pub async fn add_speciality(&self, title: &str) {
        self.state.lock().await.specialities.push(title.to_string());
    }

    pub async fn add_doctor(&self, full_name: &str, specialities: Vec<(&str, i64)>) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_doctor_id;
        state.next_doctor_id += 1;
        for (title, _) in &specialities {
            if !state.specialities.iter().any(|t| t == title) {
                state.specialities.push(title.to_string());
            }
        }
        state.doctors.push(Doctor {
            id,
            full_name: full_name.to_string(),
            photo: format!("photo-{id}"),
            description: "Описание".to_string(),
            experience: None,
            science_degree: None,
            qual_category: None,
            specialities: specialities
                .into_iter()
                .map(|(title, price)| SpecialityPrice { title: title.to_string(), price })
                .collect(),
        });
        id
    }

    pub async fn script_counts(&self, values: &[i64]) {
        self.state.lock().await.counts = values.iter().copied().collect();
    }

    fn check_failure(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database(rusqlite::Error::InvalidQuery));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn get_admin_ids(&self, privilege: Option<PrivilegeLevel>) -> AppResult<Vec<i64>> {
        self.check_failure()?;
        Ok(self
            .state
            .lock()
            .await
            .admins
            .iter()
            .filter(|admin| privilege.map_or(true, |level| admin.privilege == level))
            .map(|admin| admin.user_id)
            .collect())
    }

    async fn get_admins(&self) -> AppResult<Vec<AdminRecord>> {
        Ok(self.state.lock().await.admins.clone())
    }

    async fn create_admin(&self, user_id: i64, full_name: &str, privilege: PrivilegeLevel) -> AppResult<()> {
        self.add_admin(user_id, full_name, privilege).await;
        Ok(())
    }

    async fn delete_admin(&self, user_id: i64) -> AppResult<()> {
        self.state.lock().await.admins.retain(|admin| admin.user_id != user_id);
        Ok(())
    }

    async fn get_specialities(&self) -> AppResult<Vec<String>> {
        self.check_failure()?;
        Ok(self.state.lock().await.specialities.clone())
    }

    async fn create_speciality(&self, title: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.specialities.iter().any(|t| t == title) {
            state.specialities.push(title.to_string());
        }
        Ok(())
    }

    async fn delete_speciality(&self, title: &str) -> AppResult<()> {
        self.state.lock().await.specialities.retain(|t| t != title);
        Ok(())
    }

    async fn get_doctors(&self) -> AppResult<Vec<Doctor>> {
        Ok(self.state.lock().await.doctors.clone())
    }

    async fn get_doctor(&self, id: i64) -> AppResult<Option<Doctor>> {
        Ok(self.state.lock().await.doctors.iter().find(|doc| doc.id == id).cloned())
    }

    async fn get_doctors_by_speciality(&self, title: &str) -> AppResult<Vec<Doctor>> {
        Ok(self
            .state
            .lock()
            .await
            .doctors
            .iter()
            .filter(|doc| doc.specialities.iter().any(|sp| sp.title == title))
            .cloned()
            .collect())
    }

    async fn create_doctor(&self, doctor: &NewDoctor) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        let id = state.next_doctor_id;
        state.next_doctor_id += 1;
        for sp in &doctor.specialities {
            if !state.specialities.iter().any(|t| *t == sp.title) {
                state.specialities.push(sp.title.clone());
            }
        }
        state.doctors.push(Doctor {
            id,
            full_name: doctor.full_name.clone(),
            photo: doctor.photo.clone(),
            description: doctor.description.clone(),
            experience: doctor.experience,
            science_degree: doctor.science_degree.clone(),
            qual_category: doctor.qual_category.clone(),
            specialities: doctor.specialities.clone(),
        });
        Ok(id)
    }

    async fn update_doctor_field(&self, id: i64, field: DoctorField, value: Option<&str>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let Some(doctor) = state.doctors.iter_mut().find(|doc| doc.id == id) else {
            return Ok(());
        };
        match field {
            DoctorField::FullName => doctor.full_name = value.unwrap_or_default().to_string(),
            DoctorField::Photo => doctor.photo = value.unwrap_or_default().to_string(),
            DoctorField::Description => doctor.description = value.unwrap_or_default().to_string(),
            DoctorField::Experience => doctor.experience = value.and_then(|v| v.parse().ok()),
            DoctorField::ScienceDegree => doctor.science_degree = value.map(str::to_string),
            DoctorField::QualCategory => doctor.qual_category = value.map(str::to_string),
        }
        Ok(())
    }

    async fn add_doctor_speciality(&self, id: i64, title: &str, price: i64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.specialities.iter().any(|t| t == title) {
            state.specialities.push(title.to_string());
        }
        if let Some(doctor) = state.doctors.iter_mut().find(|doc| doc.id == id) {
            doctor.specialities.push(SpecialityPrice { title: title.to_string(), price });
        }
        Ok(())
    }

    async fn remove_doctor_speciality(&self, id: i64, title: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(doctor) = state.doctors.iter_mut().find(|doc| doc.id == id) {
            doctor.specialities.retain(|sp| sp.title != title);
        }
        Ok(())
    }

    async fn set_doctor_price(&self, id: i64, title: &str, price: i64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(doctor) = state.doctors.iter_mut().find(|doc| doc.id == id) {
            if let Some(sp) = doctor.specialities.iter_mut().find(|sp| sp.title == title) {
                sp.price = price;
            }
        }
        Ok(())
    }

    async fn delete_doctor(&self, id: i64) -> AppResult<()> {
        self.state.lock().await.doctors.retain(|doc| doc.id != id);
        Ok(())
    }

    async fn ensure_user(&self, _user_id: i64, _username: Option<&str>) -> AppResult<()> {
        Ok(())
    }

    async fn create_appointment(&self, rec: &NewAppointment) -> AppResult<()> {
        self.state.lock().await.appointments.push(rec.clone());
        Ok(())
    }

    async fn create_callback(&self, rec: &NewCallback) -> AppResult<()> {
        self.state.lock().await.callbacks.push(rec.clone());
        Ok(())
    }

    async fn create_feedback(&self, rec: &NewFeedback) -> AppResult<()> {
        self.state.lock().await.feedbacks.push(rec.clone());
        Ok(())
    }

    async fn count_records(
        &self,
        _table: StatTable,
        _range: &DateRange,
        _consultation: Option<ConsultationType>,
    ) -> AppResult<i64> {
        Ok(self.state.lock().await.counts.pop_front().unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Renderer fake

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Send { chat_id: i64, text: String, markup: Option<Markup> },
    Edit { chat_id: i64, message_id: i64, text: String, markup: Option<Markup> },
    EditMarkup { chat_id: i64, message_id: i64, markup: Option<Markup> },
    Delete { chat_id: i64, message_id: i64 },
    Photo { chat_id: i64, photo: String, caption: String, markup: Option<Markup> },
    Invoice { chat_id: i64, payload: String, amount_minor: i64 },
}

/// Records every outbound call and hands out increasing message ids
#[derive(Default)]
pub struct RecordingRenderer {
    next_id: AtomicI64,
    pub calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self { next_id: AtomicI64::new(1000), calls: Mutex::new(Vec::new()) }
    }

    pub async fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().await.clone()
    }

    /// All texts sent or edited to the given chat, in order
    pub async fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                RenderCall::Send { chat_id: c, text, .. } | RenderCall::Edit { chat_id: c, text, .. }
                    if *c == chat_id =>
                {
                    Some(text.clone())
                }
                RenderCall::Photo { chat_id: c, caption, .. } if *c == chat_id => Some(caption.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn last_markup_for(&self, chat_id: i64) -> Option<Markup> {
        self.calls
            .lock()
            .await
            .iter()
            .rev()
            .find_map(|call| match call {
                RenderCall::Send { chat_id: c, markup, .. }
                | RenderCall::Edit { chat_id: c, markup, .. }
                | RenderCall::EditMarkup { chat_id: c, markup, .. }
                    if *c == chat_id =>
                {
                    markup.clone()
                }
                _ => None,
            })
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn send(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(RenderCall::Send { chat_id, text: text.to_string(), markup });
        Ok(id)
    }

    async fn edit(&self, chat_id: i64, message_id: i64, text: &str, markup: Option<Markup>) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(RenderCall::Edit { chat_id, message_id, text: text.to_string(), markup });
        Ok(())
    }

    async fn edit_markup(&self, chat_id: i64, message_id: i64, markup: Option<Markup>) -> AppResult<()> {
        self.calls.lock().await.push(RenderCall::EditMarkup { chat_id, message_id, markup });
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> AppResult<()> {
        self.calls.lock().await.push(RenderCall::Delete { chat_id, message_id });
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str, markup: Option<Markup>) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(RenderCall::Photo {
            chat_id,
            photo: photo.to_string(),
            caption: caption.to_string(),
            markup,
        });
        Ok(id)
    }
}

#[async_trait]
impl PaymentGateway for RecordingRenderer {
    async fn send_invoice(
        &self,
        chat_id: i64,
        _title: &str,
        _description: &str,
        payload: &str,
        amount_minor: i64,
    ) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .await
            .push(RenderCall::Invoice { chat_id, payload: payload.to_string(), amount_minor });
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Link provider fake

pub struct StubLinks {
    pub url: Option<&'static str>,
}

#[async_trait]
impl LinkProvider for StubLinks {
    async fn conference_link(&self) -> AppResult<Url> {
        match self.url {
            Some(url) => Ok(Url::parse(url).expect("stub url")),
            None => Err(AppError::LinkProvider("page layout changed".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness

pub struct Harness {
    pub directory: Arc<MockDirectory>,
    pub renderer: Arc<RecordingRenderer>,
    pub deps: Deps,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_links(Some("https://jazz.sber.ru/abc123"))
    }

    pub fn with_links(url: Option<&'static str>) -> Self {
        setup_env();
        let directory = Arc::new(MockDirectory::new());
        let renderer = Arc::new(RecordingRenderer::new());
        let cache = Arc::new(CacheCoordinator::new(
            Arc::new(MemoryCacheBackend::new()),
            directory.clone(),
            std::time::Duration::from_secs(3600),
        ));
        let deps = Deps {
            directory: directory.clone(),
            cache,
            sessions: Arc::new(MemorySessionStore::new()),
            renderer: renderer.clone(),
            payments: renderer.clone(),
            links: Arc::new(StubLinks { url }),
        };
        let dispatcher = Dispatcher::new(deps.clone());
        Self { directory, renderer, deps, dispatcher }
    }

    pub async fn press(&self, user_id: i64, data: &str) {
        self.dispatcher
            .handle(user_id, Event::Button { message_id: 1, data: data.to_string(), username: None })
            .await;
    }

    pub async fn press_as(&self, user_id: i64, data: &str, username: &str) {
        self.dispatcher
            .handle(
                user_id,
                Event::Button { message_id: 1, data: data.to_string(), username: Some(username.to_string()) },
            )
            .await;
    }

    pub async fn text(&self, user_id: i64, body: &str) {
        self.dispatcher
            .handle(
                user_id,
                Event::Message { message_id: 2, payload: MessagePayload::Text(body.to_string()), username: None },
            )
            .await;
    }

    pub async fn document(&self, user_id: i64, file_id: &str) {
        self.dispatcher
            .handle(
                user_id,
                Event::Message {
                    message_id: 3,
                    payload: MessagePayload::Document { file_id: file_id.to_string() },
                    username: None,
                },
            )
            .await;
    }

    pub async fn payment(&self, user_id: i64, charge_id: &str, payload: &str) {
        self.dispatcher
            .handle(
                user_id,
                Event::Message {
                    message_id: 4,
                    payload: MessagePayload::PaymentConfirmed {
                        charge_id: charge_id.to_string(),
                        payload: payload.to_string(),
                    },
                    username: None,
                },
            )
            .await;
    }

    pub async fn session_exists(&self, user_id: i64) -> bool {
        self.deps.sessions.get(user_id).await.unwrap().is_some()
    }
}
