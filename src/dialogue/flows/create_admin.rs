//! Admin creation flow
//!
//! Duplicate uids are checked against the live admin list (never the cache)
//! before the name state can be entered. The privilege level is forced to
//! low unless the master admin is creating the account, in which case an
//! explicit high/low choice is offered.

use crate::cache::CacheKey;
use crate::core::config;
use crate::core::validation;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern};
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{AdminForm, FlowKind, Scratch};
use crate::dialogue::texts;
use crate::storage::directory::PrivilegeLevel;

pub mod state {
    pub const UID: &str = "uid";
    pub const NAME: &str = "name";
    pub const PRIVILEGE: &str = "privilege";
    pub const CONFIRMATION: &str = "confirmation";
}

pub fn scratch() -> Scratch {
    Scratch::CreateAdmin(AdminForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::CreateAdmin,
        entry_state: state::UID,
        entry_guard: Guard::Privileged,
        entry,
        transitions: vec![
            Transition::new(state::UID, EventPattern::Text, get_uid),
            Transition::new(state::NAME, EventPattern::Text, get_name),
            Transition::new(state::PRIVILEGE, EventPattern::ButtonNamespace("priv"), get_privilege),
            Transition::guarded(state::CONFIRMATION, EventPattern::Button("confirm"), Guard::Privileged, commit),
            Transition::new(state::CONFIRMATION, EventPattern::Button("change"), restart),
        ],
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        ctx.edit_anchor(texts::ASK_UID, Some(keyboards::back_to_menu(section::ADMINS)))
            .await?;
        Ok(Step::Stay)
    })
}

fn get_uid<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        if !validation::check_integer(text) {
            ctx.discard_event_message(event).await;
            ctx.edit_anchor(texts::ASK_UID_AGAIN, Some(keyboards::back_to_menu(section::ADMINS)))
                .await?;
            return Ok(Step::Stay);
        }
        let uid = validation::parse_integer(text)?;
        ctx.discard_event_message(event).await;

        // the duplicate check always goes to the source of truth
        let admins = ctx.deps.directory.get_admin_ids(None).await?;
        if admins.contains(&uid) {
            log::info!("admin {} attempted to re-create admin {}", ctx.user_id, uid);
            ctx.edit_anchor(texts::ADMIN_ALREADY_EXISTS, None).await?;
            ctx.deps
                .renderer
                .send(ctx.user_id, &texts::menu_desc(), Some(keyboards::admins_menu()))
                .await?;
            return Ok(Step::Done);
        }

        ctx.session.scratch.admin()?.uid = Some(uid);
        ctx.edit_anchor(texts::ASK_ADMIN_NAME, Some(keyboards::back_to_menu(section::ADMINS)))
            .await?;
        Ok(Step::Goto(state::NAME))
    })
}

fn get_name<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let name = validation::normalize_input(text, ' ').join(" ");
        ctx.discard_event_message(event).await;

        if ctx.user_id != *config::MASTER_ADMIN {
            // only the master admin may grant high privilege
            let form = ctx.session.scratch.admin()?;
            form.name = name;
            form.privilege = Some(PrivilegeLevel::Low);
            let uid = form.uid.unwrap_or_default();
            let confirm = texts::confirm_creation(uid, &form.name, false);
            ctx.edit_anchor(&confirm, Some(keyboards::confirmation_menu(section::ADMINS)))
                .await?;
            Ok(Step::Goto(state::CONFIRMATION))
        } else {
            ctx.session.scratch.admin()?.name = name;
            ctx.edit_anchor(texts::ASK_PRIVILEGE_TYPE, Some(keyboards::privilege_levels()))
                .await?;
            Ok(Step::Goto(state::PRIVILEGE))
        }
    })
}

fn get_privilege<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let privilege = match event.button_arg() {
            Some("high") => PrivilegeLevel::High,
            _ => PrivilegeLevel::Low,
        };
        let form = ctx.session.scratch.admin()?;
        form.privilege = Some(privilege);
        let uid = form.uid.unwrap_or_default();
        let confirm = texts::confirm_creation(uid, &form.name, privilege == PrivilegeLevel::High);
        ctx.edit_anchor(&confirm, Some(keyboards::confirmation_menu(section::ADMINS)))
            .await?;
        Ok(Step::Goto(state::CONFIRMATION))
    })
}

fn commit<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.admin()?.clone();
        let uid = form
            .uid
            .ok_or_else(|| crate::core::error::AppError::Session("admin uid not collected".to_string()))?;
        let privilege = form.privilege.unwrap_or(PrivilegeLevel::Low);
        ctx.deps.directory.create_admin(uid, &form.name, privilege).await?;
        log::info!(
            "admin {} created {} privilege admin with id {} and with name \"{}\"",
            ctx.user_id,
            privilege.as_str(),
            uid,
            form.name
        );
        ctx.deps
            .cache
            .invalidate(&[CacheKey::PrivAdmins, CacheKey::Admins])
            .await?;
        ctx.edit_anchor(texts::SUCCESSFUL_ADMIN_CREATION, None).await?;
        ctx.deps
            .renderer
            .send(ctx.user_id, &texts::menu_desc(), Some(keyboards::admins_menu()))
            .await?;
        Ok(Step::Done)
    })
}

fn restart<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        *ctx.session.scratch.admin()? = AdminForm::default();
        ctx.edit_anchor(texts::ASK_UID, Some(keyboards::back_to_menu(section::ADMINS)))
            .await?;
        Ok(Step::Goto(state::UID))
    })
}
