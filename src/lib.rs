//! Doctoria - Telegram appointment and CRM assistant bot for a medical clinic
//!
//! This library provides all the core functionality for the Doctoria bot:
//! the conversational state-machine engine, per-user sessions, reference-data
//! caching, storage, scheduled jobs and the Telegram integration.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, validation, statistic computation
//! - `storage`: Database pool and the data-access interface
//! - `cache`: Read-through reference-data cache
//! - `dialogue`: Sessions, the FSM engine and the nine flow definitions
//! - `conference`: Video-conference link provider
//! - `schedule`: Background jobs
//! - `telegram`: Telegram bot integration and handlers

pub mod cache;
pub mod conference;
pub mod core;
pub mod dialogue;
pub mod schedule;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use dialogue::{Deps, Dispatcher, Event, FlowKind, MessagePayload, Session};
pub use storage::{create_pool, get_connection, DbPool, SqliteDirectory};
