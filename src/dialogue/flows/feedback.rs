//! Feedback flow: a single free-text message relayed to the administrators

use crate::core::config;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern};
use crate::dialogue::flows::send_main_menu;
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{FeedbackForm, FlowKind, Scratch};
use crate::dialogue::texts;
use crate::storage::directory::NewFeedback;

pub mod state {
    pub const TEXT: &str = "text";
}

pub fn scratch() -> Scratch {
    Scratch::Feedback(FeedbackForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::Feedback,
        entry_state: state::TEXT,
        entry_guard: Guard::None,
        entry,
        transitions: vec![Transition::new(state::TEXT, EventPattern::Text, get_feedback)],
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        ctx.edit_anchor(texts::ASK_FEEDBACK, Some(keyboards::back_to_menu(section::MAIN)))
            .await?;
        Ok(Step::Stay)
    })
}

fn get_feedback<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let username = event.username().map(str::to_string);
        let display_name = username.clone().unwrap_or_else(|| ctx.user_id.to_string());

        ctx.deps
            .directory
            .create_feedback(&NewFeedback {
                user_id: ctx.user_id,
                username: username.clone(),
                full_name: display_name.clone(),
                message: text.to_string(),
            })
            .await?;
        ctx.deps
            .renderer
            .send(
                *config::REQUESTS_CHAT_ID,
                &texts::feedback_request(&display_name, username.as_deref(), ctx.user_id, text),
                None,
            )
            .await?;
        log::info!("user {} left feedback", ctx.user_id);

        ctx.discard_event_message(event).await;
        ctx.edit_anchor(texts::CONFIRM_FEEDBACK_SUCCESS, None).await?;
        send_main_menu(&ctx.deps, ctx.user_id).await?;
        Ok(Step::Done)
    })
}
