//! Telegram implementations of the dialogue core's outbound ports

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LabeledPrice, MessageId, ParseMode,
};

use crate::core::config;
use crate::core::error::AppResult;
use crate::dialogue::render::{Markup, PaymentGateway, Renderer};

/// Renders dialogue output through the Bot API (HTML parse mode)
pub struct TelegramRenderer {
    bot: Bot,
}

impl TelegramRenderer {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn keyboard(markup: Markup) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(markup.rows.into_iter().map(|row| {
            row.into_iter()
                .map(|button| InlineKeyboardButton::callback(button.label, button.data))
                .collect::<Vec<_>>()
        }))
    }
}

#[async_trait]
impl Renderer for TelegramRenderer {
    async fn send(&self, chat_id: i64, text: &str, markup: Option<Markup>) -> AppResult<i64> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(Self::keyboard(markup));
        }
        let message = request.await?;
        Ok(message.id.0 as i64)
    }

    async fn edit(&self, chat_id: i64, message_id: i64, text: &str, markup: Option<Markup>) -> AppResult<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(Self::keyboard(markup));
        }
        request.await?;
        Ok(())
    }

    async fn edit_markup(&self, chat_id: i64, message_id: i64, markup: Option<Markup>) -> AppResult<()> {
        let request = self
            .bot
            .edit_message_reply_markup(ChatId(chat_id), MessageId(message_id as i32));
        match markup {
            Some(markup) => request.reply_markup(Self::keyboard(markup)).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> AppResult<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id as i32))
            .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str, markup: Option<Markup>) -> AppResult<i64> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file_id(FileId(photo.to_string())))
            .caption(caption)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(Self::keyboard(markup));
        }
        let message = request.await?;
        Ok(message.id.0 as i64)
    }
}

#[async_trait]
impl PaymentGateway for TelegramRenderer {
    async fn send_invoice(
        &self,
        chat_id: i64,
        title: &str,
        description: &str,
        payload: &str,
        amount_minor: i64,
    ) -> AppResult<i64> {
        let message = self
            .bot
            .send_invoice(
                ChatId(chat_id),
                title.to_string(),
                description.to_string(),
                payload.to_string(),
                config::payment::CURRENCY.to_string(),
                vec![LabeledPrice::new("Онлайн консультация", amount_minor as u32)],
            )
            .provider_token(config::PAYMENT_PROVIDER_TOKEN.clone())
            .await?;
        Ok(message.id.0 as i64)
    }
}
