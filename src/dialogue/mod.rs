//! Conversational dialogue core
//!
//! Everything between an inbound transport event and an outbound render
//! call: per-user sessions, the transition-table state machine, access
//! control, the nine flow definitions and the dispatcher tying them
//! together.

pub mod access;
pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod flows;
pub mod keyboards;
pub mod pagination;
pub mod render;
pub mod session;
pub mod texts;

pub use dispatcher::Dispatcher;
pub use engine::{Deps, FlowCtx, FlowDefinition, Guard, Outcome, Step, Transition};
pub use event::{Event, EventPattern, MessagePayload};
pub use render::{Button, LinkProvider, Markup, PaymentGateway, Renderer};
pub use session::{FlowKind, MemorySessionStore, RedisSessionStore, Scratch, Session, SessionStore};
