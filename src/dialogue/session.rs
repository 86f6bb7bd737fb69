//! Per-user conversation sessions
//!
//! One session per user, created when a flow is entered and destroyed on
//! completion, cancellation or supersession. The scratch space is an
//! explicit struct per flow rather than a loose key-value bag, so a flow
//! cannot read another flow's half-filled answers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::error::{AppError, AppResult};
use crate::storage::directory::{CommunicationType, ConsultationType, PrivilegeLevel};

/// The nine conversational flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    CreateDoctor,
    UpdateDoctor,
    DeleteDoctor,
    CreateAdmin,
    DeleteAdmin,
    Appointment,
    CallbackRequest,
    Feedback,
    Statistics,
}

/// Compact reference to a doctor shown in selection keyboards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorCard {
    pub id: i64,
    pub full_name: String,
    pub photo: String,
}

/// Doctor-creation answers. `prices` is paired with `selected`
/// index-for-index; `unpriced` is the work queue of specialities still
/// waiting for a price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorForm {
    pub catalog: Vec<String>,
    pub selected: Vec<String>,
    pub name: String,
    pub photo: String,
    pub description: String,
    pub experience: Option<i64>,
    pub science_degree: Option<String>,
    pub qual_category: Option<String>,
    pub prices: Vec<i64>,
    pub unpriced: Vec<String>,
}

/// Doctor-update scratch: the picked doctor, the section under edit and the
/// speciality add/remove working sets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDoctorForm {
    pub doctors: Vec<DoctorCard>,
    pub doctor_id: Option<i64>,
    pub doctor_name: String,
    pub section: Option<String>,
    pub catalog: Vec<String>,
    /// Doctor's specialities at flow start
    pub current: Vec<String>,
    pub selected: Vec<String>,
    pub prices: Vec<i64>,
    pub unpriced: Vec<String>,
    pub price_speciality: Option<String>,
}

/// One entry of a deletable roster (doctors or admins)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: i64,
    pub name: String,
}

/// Multi-select deletion scratch shared by the doctor- and admin-deletion
/// flows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterForm {
    pub pool: Vec<RosterEntry>,
    pub chosen: Vec<i64>,
}

impl RosterForm {
    /// Toggles one roster entry in the selection
    pub fn toggle(&mut self, id: i64) {
        if let Some(pos) = self.chosen.iter().position(|&c| c == id) {
            self.chosen.remove(pos);
        } else {
            self.chosen.push(id);
        }
    }

    pub fn chosen_names(&self) -> Vec<String> {
        self.pool
            .iter()
            .filter(|entry| self.chosen.contains(&entry.id))
            .map(|entry| entry.name.clone())
            .collect()
    }
}

/// Admin-creation answers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminForm {
    pub uid: Option<i64>,
    pub name: String,
    pub privilege: Option<PrivilegeLevel>,
}

/// Appointment-booking answers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentForm {
    pub consultation: Option<ConsultationType>,
    /// "/4" for offline, "/5" for online — used in step captions
    pub steps_total: String,
    pub specialities: Vec<String>,
    pub page: usize,
    pub speciality: Option<String>,
    pub doctors: Vec<DoctorCard>,
    pub doctor_id: Option<i64>,
    /// Chosen doctor name (online) or free-text request (offline)
    pub request: String,
    pub preferred_at: Option<String>,
    pub communication: Option<CommunicationType>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub username_missing: bool,
    pub name: String,
    pub price: Option<i64>,
    /// Request card posted to the administrators' channel
    pub request_text: String,
    pub request_msg_id: Option<i64>,
}

/// Callback-request answers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackForm {
    pub name: String,
}

/// Feedback collects a single message; nothing accumulates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackForm {}

/// Custom statistic period collects a single answer; nothing accumulates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsForm {}

/// Typed per-flow scratch space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scratch {
    CreateDoctor(DoctorForm),
    UpdateDoctor(UpdateDoctorForm),
    DeleteDoctor(RosterForm),
    CreateAdmin(AdminForm),
    DeleteAdmin(RosterForm),
    Appointment(AppointmentForm),
    CallbackRequest(CallbackForm),
    Feedback(FeedbackForm),
    Statistics(StatisticsForm),
}

macro_rules! scratch_accessor {
    ($fn_name:ident, $variant:ident, $form:ty) => {
        pub fn $fn_name(&mut self) -> AppResult<&mut $form> {
            match self {
                Scratch::$variant(form) => Ok(form),
                other => Err(AppError::Session(format!(
                    concat!(stringify!($variant), " scratch expected, found {:?}"),
                    std::mem::discriminant(other)
                ))),
            }
        }
    };
}

impl Scratch {
    scratch_accessor!(doctor, CreateDoctor, DoctorForm);
    scratch_accessor!(update_doctor, UpdateDoctor, UpdateDoctorForm);
    scratch_accessor!(delete_doctor, DeleteDoctor, RosterForm);
    scratch_accessor!(admin, CreateAdmin, AdminForm);
    scratch_accessor!(delete_admin, DeleteAdmin, RosterForm);
    scratch_accessor!(appointment, Appointment, AppointmentForm);
    scratch_accessor!(callback, CallbackRequest, CallbackForm);
}

/// Live state of one user's in-progress flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub flow: FlowKind,
    pub state: String,
    /// Message the bot keeps editing as the dialogue progresses
    pub anchor: Option<i64>,
    /// Auxiliary messages (doctor cards, interim prompts) cleaned up later
    pub pending_deletes: Vec<i64>,
    pub scratch: Scratch,
}

impl Session {
    pub fn new(user_id: i64, flow: FlowKind, entry_state: &str, scratch: Scratch) -> Self {
        Self {
            user_id,
            flow,
            state: entry_state.to_string(),
            anchor: None,
            pending_deletes: Vec::new(),
            scratch,
        }
    }

    pub fn set_state(&mut self, state: &str) {
        self.state = state.to_string();
    }
}

/// Session persistence port. Read-modify-write is sequenced per user by the
/// dispatcher, so the store itself only needs plain get/put/delete.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: i64) -> AppResult<Option<Session>>;

    async fn put(&self, session: &Session) -> AppResult<()>;

    async fn delete(&self, user_id: i64) -> AppResult<()>;
}

/// In-process session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: i64) -> AppResult<Option<Session>> {
        Ok(self.sessions.lock().await.get(&user_id).cloned())
    }

    async fn put(&self, session: &Session) -> AppResult<()> {
        self.sessions.lock().await.insert(session.user_id, session.clone());
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> AppResult<()> {
        self.sessions.lock().await.remove(&user_id);
        Ok(())
    }
}

/// Redis-backed session store; sessions survive process restarts
pub struct RedisSessionStore {
    manager: redis::aio::ConnectionManager,
    ttl_secs: u64,
}

impl RedisSessionStore {
    /// Sessions expire after `ttl_secs` of inactivity so abandoned
    /// conversations don't pile up
    pub fn new(manager: redis::aio::ConnectionManager, ttl_secs: u64) -> Self {
        Self { manager, ttl_secs }
    }

    fn key(user_id: i64) -> String {
        format!("doctoria:session:{user_id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, user_id: i64) -> AppResult<Option<Session>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(user_id)).await?;
        match raw {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, session: &Session) -> AppResult<()> {
        let blob = serde_json::to_string(session)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::key(session.user_id), blob, self.ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(Self::key(user_id)).await?;
        Ok(())
    }
}
