//! Telegram bot integration
//!
//! Adapters only: the dialogue core renders through its ports, and this
//! module maps those ports (and inbound updates) onto teloxide.

pub mod bot;
pub mod handlers;
pub mod renderer;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use renderer::TelegramRenderer;
