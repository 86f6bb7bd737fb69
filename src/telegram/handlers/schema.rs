//! Dispatcher schema and handler chain builders
//!
//! The handler tree converts raw teloxide updates into core `Event`s and
//! hands them to the dialogue dispatcher. The same schema is used in
//! production and in integration tests.

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::dialogue::{Event, MessagePayload};
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_precheckout = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(pre_checkout_handler(deps_precheckout))
        .branch(callback_handler(deps_callback))
}

/// Converts an inbound message into a core event, keyed by sender
fn message_event(msg: &Message) -> Option<(i64, Event)> {
    let from = msg.from.as_ref()?;
    let user_id = i64::try_from(from.id.0).ok()?;
    let username = from.username.clone();
    let payload = if let Some(payment) = msg.successful_payment() {
        MessagePayload::PaymentConfirmed {
            charge_id: payment.telegram_payment_charge_id.0.clone(),
            payload: payment.invoice_payload.clone(),
        }
    } else if let Some(document) = msg.document() {
        MessagePayload::Document { file_id: document.file.id.0.clone() }
    } else if let Some(contact) = msg.contact() {
        MessagePayload::Contact { phone: contact.phone_number.clone() }
    } else if let Some(text) = msg.text() {
        MessagePayload::Text(text.to_string())
    } else {
        MessagePayload::Other
    };
    Some((
        user_id,
        Event::Message {
            message_id: msg.id.0 as i64,
            payload,
            username,
        },
    ))
}

/// Handler for bot commands (/start)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("received command: {:?} from chat {}", cmd, msg.chat.id);
                match cmd {
                    Command::Start => {
                        let user_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0);
                        let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
                        if let Err(e) = deps.dispatcher.start_command(user_id, username).await {
                            log::error!("/start failed for user {}: {}", user_id, e);
                        }
                    }
                }
                Ok(())
            }
        },
    ))
}

/// Handler for dialogue messages (text, contacts, documents, payments)
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                if let Some((user_id, event)) = message_event(&msg) {
                    deps.dispatcher.handle(user_id, event).await;
                }
                Ok(())
            }
        })
}

/// Handler for pre-checkout queries: invoices are validated at issue time,
/// so every query with the appointment payload is approved
fn pre_checkout_handler(_deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_pre_checkout_query().endpoint(
        move |bot: Bot, query: teloxide::types::PreCheckoutQuery| async move {
            log::info!(
                "received pre_checkout_query: id={}, payload={}",
                query.id,
                query.invoice_payload
            );
            if let Err(e) = bot.answer_pre_checkout_query(query.id.clone(), true).await {
                log::error!("failed to answer pre_checkout_query: {:?}", e);
            }
            Ok(())
        },
    )
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            // stop the client-side loading spinner right away
            let _ = bot.answer_callback_query(q.id.clone()).await;

            let Some(data) = q.data.clone() else { return Ok(()) };
            let Some(message_id) = q.message.as_ref().map(|m| m.id().0 as i64) else {
                return Ok(());
            };
            let user_id = match i64::try_from(q.from.id.0) {
                Ok(id) => id,
                Err(_) => return Ok(()),
            };
            let event = Event::Button {
                message_id,
                data,
                username: q.from.username.clone(),
            };
            deps.dispatcher.handle(user_id, event).await;
            Ok(())
        }
    })
}
