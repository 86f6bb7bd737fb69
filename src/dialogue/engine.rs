//! Generic conversational state machine
//!
//! A flow is a declarative table of transitions: `(state, event pattern) →
//! handler`. Resolution picks the first registered transition whose state
//! and pattern match; an event with no match is dropped so stale button
//! presses from old screens can't derail a conversation. Access guards run
//! before the handler and are re-evaluated on every gated transition, so a
//! privilege revocation takes effect on the admin's very next action.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::cache::CacheCoordinator;
use crate::core::error::AppResult;
use crate::dialogue::access;
use crate::dialogue::event::{Event, EventPattern};
use crate::dialogue::keyboards;
use crate::dialogue::render::{LinkProvider, Markup, PaymentGateway, Renderer};
use crate::dialogue::session::{FlowKind, Session, SessionStore};
use crate::dialogue::texts;
use crate::storage::directory::Directory;

/// Opaque state token scoped to one flow definition
pub type StateToken = &'static str;

/// Shared collaborators handed to every flow handler
#[derive(Clone)]
pub struct Deps {
    pub directory: Arc<dyn Directory>,
    pub cache: Arc<CacheCoordinator>,
    pub sessions: Arc<dyn SessionStore>,
    pub renderer: Arc<dyn Renderer>,
    pub payments: Arc<dyn PaymentGateway>,
    pub links: Arc<dyn LinkProvider>,
}

/// Mutable context of one event being processed
pub struct FlowCtx {
    pub user_id: i64,
    pub session: Session,
    pub deps: Deps,
}

impl FlowCtx {
    /// Private chats: the chat id is the user id
    pub fn chat_id(&self) -> i64 {
        self.user_id
    }

    /// Edits the anchor message the dialogue keeps reusing, or sends a new
    /// one when there is no anchor yet (or the old one was deleted).
    pub async fn edit_anchor(&mut self, text: &str, markup: Option<Markup>) -> AppResult<()> {
        match self.session.anchor {
            Some(anchor) => {
                self.deps
                    .renderer
                    .edit(self.user_id, anchor, text, markup)
                    .await?;
            }
            None => {
                let id = self.deps.renderer.send(self.user_id, text, markup).await?;
                self.session.anchor = Some(id);
            }
        }
        Ok(())
    }

    /// Sends a fresh message and makes it the new anchor
    pub async fn replace_anchor(&mut self, text: &str, markup: Option<Markup>) -> AppResult<()> {
        let id = self.deps.renderer.send(self.user_id, text, markup).await?;
        self.session.anchor = Some(id);
        Ok(())
    }

    /// Drops the user's answer message; failures are irrelevant (the message
    /// may already be gone)
    pub async fn discard_event_message(&self, event: &Event) {
        let _ = self.deps.renderer.delete(self.user_id, event.message_id()).await;
    }

    /// Deletes all accumulated auxiliary messages
    pub async fn flush_pending(&mut self) {
        for message_id in std::mem::take(&mut self.session.pending_deletes) {
            let _ = self.deps.renderer.delete(self.user_id, message_id).await;
        }
    }
}

/// What a transition handler decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stay in the current state (validation failure re-prompt, toggle
    /// updates)
    Stay,
    /// Advance to another state
    Goto(StateToken),
    /// Terminal: the session is deleted
    Done,
}

/// Result of dispatching one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No transition matched; the event was dropped
    Ignored,
    /// The session advanced (or stayed) and must be persisted
    Persist,
    /// The flow reached a terminal state; the session must be deleted
    End,
}

/// Access requirement checked before a transition handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    None,
    Admin,
    Privileged,
}

impl Guard {
    pub async fn allows(&self, deps: &Deps, user_id: i64) -> AppResult<bool> {
        match self {
            Guard::None => Ok(true),
            Guard::Admin => access::is_admin(&deps.cache, user_id).await,
            Guard::Privileged => access::is_privileged(&deps.cache, user_id).await,
        }
    }
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = AppResult<Step>> + Send + 'a>>;

/// Transition handler: mutates the session scratch, performs side effects,
/// decides the next step
pub type Handler = for<'a> fn(&'a mut FlowCtx, &'a Event) -> HandlerFuture<'a>;

/// One row of the transition table
pub struct Transition {
    pub state: StateToken,
    pub pattern: EventPattern,
    pub guard: Guard,
    pub handler: Handler,
}

impl Transition {
    pub fn new(state: StateToken, pattern: EventPattern, handler: Handler) -> Self {
        Self { state, pattern, guard: Guard::None, handler }
    }

    pub fn guarded(state: StateToken, pattern: EventPattern, guard: Guard, handler: Handler) -> Self {
        Self { state, pattern, guard, handler }
    }
}

/// Static definition of one flow: entry point plus the transition table
pub struct FlowDefinition {
    pub kind: FlowKind,
    pub entry_state: StateToken,
    pub entry_guard: Guard,
    pub entry: Handler,
    pub transitions: Vec<Transition>,
}

impl FlowDefinition {
    /// First registered transition matching the current state and event
    pub fn resolve(&self, state: &str, event: &Event) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.state == state && t.pattern.matches(event))
    }

    /// Runs one event against the session in `ctx`
    pub async fn dispatch(&self, ctx: &mut FlowCtx, event: &Event) -> AppResult<Outcome> {
        let Some(transition) = self.resolve(&ctx.session.state.clone(), event) else {
            log::debug!(
                "user {}: no transition from {:?}/{} for {:?}, dropping",
                ctx.user_id,
                self.kind,
                ctx.session.state,
                event
            );
            return Ok(Outcome::Ignored);
        };

        if !transition.guard.allows(&ctx.deps, ctx.user_id).await? {
            deny(ctx, event).await?;
            return Ok(Outcome::End);
        }

        match (transition.handler)(ctx, event).await? {
            Step::Stay => Ok(Outcome::Persist),
            Step::Goto(state) => {
                ctx.session.set_state(state);
                Ok(Outcome::Persist)
            }
            Step::Done => Ok(Outcome::End),
        }
    }

    /// Runs the entry handler for a freshly created session
    pub async fn enter(&self, ctx: &mut FlowCtx, event: &Event) -> AppResult<Outcome> {
        if !self.entry_guard.allows(&ctx.deps, ctx.user_id).await? {
            deny(ctx, event).await?;
            return Ok(Outcome::End);
        }
        match (self.entry)(ctx, event).await? {
            Step::Stay => Ok(Outcome::Persist),
            Step::Goto(state) => {
                ctx.session.set_state(state);
                Ok(Outcome::Persist)
            }
            Step::Done => Ok(Outcome::End),
        }
    }
}

/// Fixed denial response: the flow ends and the user is routed back to the
/// top-level menu
async fn deny(ctx: &mut FlowCtx, event: &Event) -> AppResult<()> {
    log::warn!("user {}: access denied in {:?}", ctx.user_id, ctx.session.flow);
    let markup = keyboards::back_to_menu(keyboards::section::MAIN);
    match event {
        Event::Button { message_id, .. } => {
            ctx.deps
                .renderer
                .edit(ctx.user_id, *message_id, texts::LACK_OF_PRIVILEGES, Some(markup))
                .await?;
        }
        Event::Message { .. } => {
            ctx.deps
                .renderer
                .send(ctx.user_id, texts::LACK_OF_PRIVILEGES, Some(markup))
                .await?;
        }
    }
    Ok(())
}
