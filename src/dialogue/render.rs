//! Outbound ports of the dialogue core
//!
//! The core never talks to a network socket. It renders through these
//! traits; the telegram module adapts them onto the Bot API and the tests
//! record the calls.

use async_trait::async_trait;
use url::Url;

use crate::core::error::AppResult;

/// One inline button
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self { label: label.into(), data: data.into() }
    }
}

/// Transport-neutral inline keyboard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Markup {
    pub rows: Vec<Vec<Button>>,
}

impl Markup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Message rendering verbs
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Sends a message, returning its id
    async fn send(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> AppResult<i64>;

    async fn edit(&self, chat_id: i64, message_id: i64, text: &str, markup: Option<Markup>) -> AppResult<()>;

    /// Replaces only the inline keyboard of an existing message
    async fn edit_markup(&self, chat_id: i64, message_id: i64, markup: Option<Markup>) -> AppResult<()>;

    async fn delete(&self, chat_id: i64, message_id: i64) -> AppResult<()>;

    /// Sends a photo by opaque reference with a caption, returning the
    /// message id
    async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str, markup: Option<Markup>) -> AppResult<i64>;
}

/// Invoice issuing port; the payment provider itself is external
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Issues an invoice, returning the invoice message id.
    /// `amount_minor` is in minor currency units (kopecks).
    async fn send_invoice(
        &self,
        chat_id: i64,
        title: &str,
        description: &str,
        payload: &str,
        amount_minor: i64,
    ) -> AppResult<i64>;
}

/// External conference-link generator (opaque: returns a URL or fails)
#[async_trait]
pub trait LinkProvider: Send + Sync {
    async fn conference_link(&self) -> AppResult<Url>;
}
