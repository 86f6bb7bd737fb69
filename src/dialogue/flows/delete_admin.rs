//! Admin deletion flow
//!
//! Same shape as doctor deletion, but gated on high privilege and followed
//! by invalidation of both admin id caches so the revoked accounts lose
//! access on their next action.

use crate::cache::CacheKey;
use crate::core::error::AppError;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern};
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{FlowKind, RosterEntry, RosterForm, Scratch};
use crate::dialogue::texts;

pub mod state {
    pub const ADMINS: &str = "admins";
    pub const CONFIRMATION: &str = "confirmation";
}

pub fn scratch() -> Scratch {
    Scratch::DeleteAdmin(RosterForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::DeleteAdmin,
        entry_state: state::ADMINS,
        entry_guard: Guard::Privileged,
        entry,
        transitions: vec![
            Transition::new(state::ADMINS, EventPattern::ButtonNamespace("pick"), toggle),
            Transition::new(state::ADMINS, EventPattern::Button("done"), ask_confirmation),
            Transition::guarded(state::CONFIRMATION, EventPattern::Button("confirm"), Guard::Privileged, commit),
            Transition::new(state::CONFIRMATION, EventPattern::Button("change"), restart),
        ],
    }
}

async fn show_roster(ctx: &mut FlowCtx) -> crate::core::error::AppResult<()> {
    let admins = ctx.deps.directory.get_admins().await?;
    let form = ctx.session.scratch.delete_admin()?;
    form.pool = admins
        .into_iter()
        .map(|admin| RosterEntry { id: admin.user_id, name: admin.full_name })
        .collect();
    form.chosen.clear();
    let markup = keyboards::roster_toggle(&form.pool, &form.chosen, section::ADMINS);
    ctx.edit_anchor(texts::ASK_TO_CHOOSE_ADMINS, Some(markup)).await
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        show_roster(ctx).await?;
        Ok(Step::Stay)
    })
}

fn toggle<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let id: i64 = event
            .button_arg()
            .and_then(|arg| arg.parse().ok())
            .ok_or_else(|| AppError::Validation("malformed admin id".to_string()))?;
        let form = ctx.session.scratch.delete_admin()?;
        form.toggle(id);
        let markup = keyboards::roster_toggle(&form.pool, &form.chosen, section::ADMINS);
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, Some(markup)).await?;
        }
        Ok(Step::Stay)
    })
}

fn ask_confirmation<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.delete_admin()?;
        if form.chosen.is_empty() {
            return Ok(Step::Stay);
        }
        let names = form.chosen_names();
        ctx.edit_anchor(
            &texts::confirm_deletion(&names),
            Some(keyboards::confirmation_menu(section::ADMINS)),
        )
        .await?;
        Ok(Step::Goto(state::CONFIRMATION))
    })
}

fn commit<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.delete_admin()?.clone();
        for entry in form.pool.iter().filter(|entry| form.chosen.contains(&entry.id)) {
            ctx.deps.directory.delete_admin(entry.id).await?;
            log::info!("admin {} deleted admin {} (\"{}\")", ctx.user_id, entry.id, entry.name);
        }
        ctx.deps
            .cache
            .invalidate(&[CacheKey::PrivAdmins, CacheKey::Admins])
            .await?;
        ctx.edit_anchor(texts::SUCCESSFUL_ADMINS_DELETION, None).await?;
        ctx.deps
            .renderer
            .send(ctx.user_id, &texts::menu_desc(), Some(keyboards::admins_menu()))
            .await?;
        Ok(Step::Done)
    })
}

fn restart<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        show_roster(ctx).await?;
        Ok(Step::Goto(state::ADMINS))
    })
}
