//! Doctor deletion flow
//!
//! Multi-select over the roster, then a confirmation step. Specialities
//! left without a single doctor are deleted too, which is the only case
//! that touches the speciality cache.

use crate::cache::CacheKey;
use crate::core::error::{AppError, AppResult};
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern};
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{FlowKind, RosterEntry, RosterForm, Scratch};
use crate::dialogue::texts;

pub mod state {
    pub const DOCTORS: &str = "doctors";
    pub const CONFIRMATION: &str = "confirmation";
}

pub fn scratch() -> Scratch {
    Scratch::DeleteDoctor(RosterForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::DeleteDoctor,
        entry_state: state::DOCTORS,
        entry_guard: Guard::Admin,
        entry,
        transitions: vec![
            Transition::new(state::DOCTORS, EventPattern::ButtonNamespace("pick"), toggle),
            Transition::new(state::DOCTORS, EventPattern::Button("done"), ask_confirmation),
            Transition::guarded(state::CONFIRMATION, EventPattern::Button("confirm"), Guard::Admin, commit),
            Transition::new(state::CONFIRMATION, EventPattern::Button("change"), restart),
        ],
    }
}

async fn show_roster(ctx: &mut FlowCtx) -> AppResult<()> {
    let doctors = ctx.deps.directory.get_doctors().await?;
    let form = ctx.session.scratch.delete_doctor()?;
    form.pool = doctors
        .into_iter()
        .map(|doctor| RosterEntry { id: doctor.id, name: doctor.full_name })
        .collect();
    form.chosen.clear();
    let markup = keyboards::roster_toggle(&form.pool, &form.chosen, section::DOCTORS);
    ctx.edit_anchor(texts::ASK_TO_CHOOSE_DOCTORS, Some(markup)).await
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
            .ok_or_else(|| AppError::Validation("malformed doctor id".to_string()))?;
        let form = ctx.session.scratch.delete_doctor()?;
        form.toggle(id);
        let markup = keyboards::roster_toggle(&form.pool, &form.chosen, section::DOCTORS);
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, Some(markup)).await?;
        }
        Ok(Step::Stay)
    })
}

fn ask_confirmation<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.delete_doctor()?;
        if form.chosen.is_empty() {
            return Ok(Step::Stay);
        }
        let names = form.chosen_names();
        ctx.edit_anchor(
            &texts::confirm_deletion(&names),
            Some(keyboards::confirmation_menu(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::CONFIRMATION))
    })
}

fn commit<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.delete_doctor()?.clone();
        let mut catalog_changed = false;
        for entry in form.pool.iter().filter(|entry| form.chosen.contains(&entry.id)) {
            let specialities = match ctx.deps.directory.get_doctor(entry.id).await? {
                Some(doctor) => doctor.specialities,
                None => continue,
            };
            ctx.deps.directory.delete_doctor(entry.id).await?;
            log::info!(
                "admin {} deleted doctor \"{}\" with specialities \"{}\"",
                ctx.user_id,
                entry.name,
                specialities.iter().map(|sp| sp.title.as_str()).collect::<Vec<_>>().join(", ")
            );
            // a speciality without doctors disappears from the catalog
            for sp in specialities {
                if ctx.deps.directory.get_doctors_by_speciality(&sp.title).await?.is_empty() {
                    ctx.deps.directory.delete_speciality(&sp.title).await?;
                    log::info!("admin {} deleted speciality \"{}\"", ctx.user_id, sp.title);
                    catalog_changed = true;
                }
            }
        }
        if catalog_changed {
            ctx.deps.cache.invalidate(&[CacheKey::Specialities]).await?;
        }
        ctx.edit_anchor(texts::SUCCESSFUL_DOCTORS_DELETION, None).await?;
        ctx.deps
            .renderer
            .send(ctx.user_id, &texts::menu_desc(), Some(keyboards::doctors_menu()))
            .await?;
        Ok(Step::Done)
    })
}

fn restart<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        show_roster(ctx).await?;
        Ok(Step::Goto(state::DOCTORS))
    })
}
