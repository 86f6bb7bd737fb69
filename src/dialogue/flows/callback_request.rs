//! Callback (call me back) request flow

use crate::core::config;
use crate::core::validation;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern, MessagePayload};
use crate::dialogue::flows::send_main_menu;
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{CallbackForm, FlowKind, Scratch};
use crate::dialogue::texts;
use crate::storage::directory::NewCallback;

pub mod state {
    pub const NAME: &str = "name";
    pub const PHONE: &str = "phone";
}

pub fn scratch() -> Scratch {
    Scratch::CallbackRequest(CallbackForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::CallbackRequest,
        entry_state: state::NAME,
        entry_guard: Guard::None,
        entry,
        transitions: vec![
            Transition::new(state::NAME, EventPattern::Text, get_name),
            Transition::new(state::PHONE, EventPattern::Contact, get_phone),
            Transition::new(state::PHONE, EventPattern::Text, get_phone),
        ],
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        ctx.edit_anchor(
            &texts::ask_name(texts::CALLBACK_TITLE, "1/2"),
            Some(keyboards::back_to_menu(section::MAIN)),
        )
        .await?;
        Ok(Step::Stay)
    })
}

fn get_name<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        ctx.session.scratch.callback()?.name = validation::normalize_input(text, ' ').join(" ");
        ctx.discard_event_message(event).await;
        ctx.edit_anchor(
            &texts::ask_phone(texts::CALLBACK_TITLE, "2/2", false, false),
            Some(keyboards::back_to_menu(section::MAIN)),
        )
        .await?;
        Ok(Step::Goto(state::PHONE))
    })
}

fn get_phone<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let phone = match event {
            Event::Message { payload: MessagePayload::Contact { phone }, .. } => validation::clean_phone(phone),
            _ => {
                let Some(text) = event.text() else { return Ok(Step::Stay) };
                let digits = validation::clean_phone(text);
                if !validation::check_phone(&digits) {
                    ctx.discard_event_message(event).await;
                    ctx.edit_anchor(
                        &texts::ask_phone(texts::CALLBACK_TITLE, "2/2", true, false),
                        Some(keyboards::back_to_menu(section::MAIN)),
                    )
                    .await?;
                    return Ok(Step::Stay);
                }
                digits
            }
        };
        let phone = validation::standardize_phone(&phone);
        let name = ctx.session.scratch.callback()?.name.clone();
        ctx.discard_event_message(event).await;

        ctx.deps
            .directory
            .create_callback(&NewCallback { user_id: ctx.user_id, full_name: name.clone(), phone: phone.clone() })
            .await?;
        ctx.deps
            .renderer
            .send(*config::REQUESTS_CHAT_ID, &texts::callback_request(&name, &phone), None)
            .await?;
        log::info!("user {} left a callback request", ctx.user_id);

        ctx.edit_anchor(texts::CONFIRM_REQUEST_SUCCESS, None).await?;
        send_main_menu(&ctx.deps, ctx.user_id).await?;
        Ok(Step::Done)
    })
}
