//! Data-access interface the dialogue core talks to
//!
//! The flows never touch SQL. They call this trait, which the storage layer
//! implements over SQLite and the tests implement in memory.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;

/// Consultation kind of an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsultationType {
    Online,
    Offline,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::Online => "online",
            ConsultationType::Offline => "offline",
        }
    }
}

/// How the administrator should contact the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunicationType {
    Call,
    Chat,
}

impl CommunicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationType::Call => "call",
            CommunicationType::Chat => "chat",
        }
    }
}

/// Admin privilege level: high unlocks statistics and admin management,
/// low covers doctor management only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrivilegeLevel {
    High,
    Low,
}

impl PrivilegeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegeLevel::High => "high",
            PrivilegeLevel::Low => "low",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "high" => Some(PrivilegeLevel::High),
            "low" => Some(PrivilegeLevel::Low),
            _ => None,
        }
    }
}

/// One speciality a doctor consults in, with its own price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialityPrice {
    pub title: String,
    pub price: i64,
}

/// Doctor roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub full_name: String,
    /// Opaque photo reference (Telegram file id); the renderer owns how it
    /// is materialised
    pub photo: String,
    pub description: String,
    pub experience: Option<i64>,
    pub science_degree: Option<String>,
    pub qual_category: Option<String>,
    pub specialities: Vec<SpecialityPrice>,
}

impl Doctor {
    pub fn price_for(&self, speciality: &str) -> Option<i64> {
        self.specialities
            .iter()
            .find(|sp| sp.title == speciality)
            .map(|sp| sp.price)
    }
}

/// Payload for creating a doctor; specialities are paired with prices
/// index-for-index
#[derive(Debug, Clone, PartialEq)]
pub struct NewDoctor {
    pub full_name: String,
    pub photo: String,
    pub description: String,
    pub experience: Option<i64>,
    pub science_degree: Option<String>,
    pub qual_category: Option<String>,
    pub specialities: Vec<SpecialityPrice>,
}

/// Scalar doctor fields editable one by one in the update flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoctorField {
    FullName,
    Photo,
    Description,
    Experience,
    ScienceDegree,
    QualCategory,
}

impl DoctorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorField::FullName => "full_name",
            DoctorField::Photo => "photo",
            DoctorField::Description => "description",
            DoctorField::Experience => "experience",
            DoctorField::ScienceDegree => "science_degree",
            DoctorField::QualCategory => "qual_category",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "full_name" => Some(DoctorField::FullName),
            "photo" => Some(DoctorField::Photo),
            "description" => Some(DoctorField::Description),
            "experience" => Some(DoctorField::Experience),
            "science_degree" => Some(DoctorField::ScienceDegree),
            "qual_category" => Some(DoctorField::QualCategory),
            _ => None,
        }
    }
}

/// Admin account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub user_id: i64,
    pub full_name: String,
    pub privilege: PrivilegeLevel,
}

/// Completed appointment booking
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub consultation: ConsultationType,
    pub communication: CommunicationType,
    /// Chosen doctor name for online bookings, free-text request otherwise
    pub request: String,
    pub doctor_id: Option<i64>,
    pub preferred_at: Option<String>,
}

/// Callback (call me back) request
#[derive(Debug, Clone, PartialEq)]
pub struct NewCallback {
    pub user_id: i64,
    pub full_name: String,
    pub phone: String,
}

/// Feedback message
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub message: String,
}

/// Tables the statistic queries count over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatTable {
    Appointments,
    Callbacks,
    Feedbacks,
    Users,
}

/// Half-open creation-time range `[start, end)`
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Storage operations the dialogue core needs
#[async_trait]
pub trait Directory: Send + Sync {
    /// Admin ids, optionally filtered by privilege level
    async fn get_admin_ids(&self, privilege: Option<PrivilegeLevel>) -> AppResult<Vec<i64>>;

    async fn get_admins(&self) -> AppResult<Vec<AdminRecord>>;

    async fn create_admin(&self, user_id: i64, full_name: &str, privilege: PrivilegeLevel) -> AppResult<()>;

    async fn delete_admin(&self, user_id: i64) -> AppResult<()>;

    /// Catalog of speciality titles, ordered
    async fn get_specialities(&self) -> AppResult<Vec<String>>;

    async fn create_speciality(&self, title: &str) -> AppResult<()>;

    async fn delete_speciality(&self, title: &str) -> AppResult<()>;

    async fn get_doctors(&self) -> AppResult<Vec<Doctor>>;

    async fn get_doctor(&self, id: i64) -> AppResult<Option<Doctor>>;

    async fn get_doctors_by_speciality(&self, title: &str) -> AppResult<Vec<Doctor>>;

    async fn create_doctor(&self, doctor: &NewDoctor) -> AppResult<i64>;

    async fn update_doctor_field(&self, id: i64, field: DoctorField, value: Option<&str>) -> AppResult<()>;

    async fn add_doctor_speciality(&self, id: i64, title: &str, price: i64) -> AppResult<()>;

    async fn remove_doctor_speciality(&self, id: i64, title: &str) -> AppResult<()>;

    async fn set_doctor_price(&self, id: i64, title: &str, price: i64) -> AppResult<()>;

    async fn delete_doctor(&self, id: i64) -> AppResult<()>;

    /// Registers the user on first contact; no-op when already known
    async fn ensure_user(&self, user_id: i64, username: Option<&str>) -> AppResult<()>;

    async fn create_appointment(&self, rec: &NewAppointment) -> AppResult<()>;

    async fn create_callback(&self, rec: &NewCallback) -> AppResult<()>;

    async fn create_feedback(&self, rec: &NewFeedback) -> AppResult<()>;

    /// Record count in a creation-time range, optionally filtered by
    /// consultation type (appointments only)
    async fn count_records(
        &self,
        table: StatTable,
        range: &DateRange,
        consultation: Option<ConsultationType>,
    ) -> AppResult<i64>;
}
