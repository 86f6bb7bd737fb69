//! Event dispatcher
//!
//! Routes every inbound event: global menu navigation (the universal
//! cancel) first, then flow entries (superseding any active session), then
//! the active session's transition table. Events for one user are processed
//! strictly one at a time — a per-user gate is held across all awaited I/O
//! of an event, which is what makes unsynchronised session read-modify-write
//! safe. Different users proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::error::{AppError, AppResult};
use crate::dialogue::access;
use crate::dialogue::engine::{Deps, FlowCtx, FlowDefinition, Outcome};
use crate::dialogue::event::{split_command, Event};
use crate::dialogue::flows;
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::Session;
use crate::dialogue::texts;

pub struct Dispatcher {
    deps: Deps,
    flows: Vec<FlowDefinition>,
    gates: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(deps: Deps) -> Self {
        Self {
            deps,
            flows: flows::definitions(),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    async fn gate(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates.entry(user_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn flow(&self, kind: crate::dialogue::session::FlowKind) -> Option<&FlowDefinition> {
        self.flows.iter().find(|def| def.kind == kind)
    }

    /// Entry point for the transport layer. Failures are logged and answered
    /// with a recoverable notice; a broken session store fails closed with a
    /// restart notice instead of guessing state.
    pub async fn handle(&self, user_id: i64, event: Event) {
        let gate = self.gate(user_id).await;
        let _guard = gate.lock().await;

        match self.process(user_id, &event).await {
            Ok(()) => {}
            Err(AppError::Store(e)) => {
                log::error!("user {}: session store unavailable: {}", user_id, e);
                let _ = self.deps.renderer.send(user_id, texts::RESTART_REQUIRED, None).await;
            }
            Err(e) => {
                log::error!("user {}: event processing failed: {}", user_id, e);
                let _ = self.deps.renderer.send(user_id, texts::TRY_AGAIN, None).await;
            }
        }
    }

    async fn process(&self, user_id: i64, event: &Event) -> AppResult<()> {
        // the universal back-to-menu press cancels whatever is in progress
        if let Some(data) = event.button_data() {
            if let ("menu", Some(target)) = split_command(data) {
                self.deps.sessions.delete(user_id).await?;
                return self.show_menu(user_id, event.message_id(), target).await;
            }
            if let Some(kind) = flows::entry_for(data) {
                // starting a new flow supersedes any prior session
                self.deps.sessions.delete(user_id).await?;
                let definition = self
                    .flow(kind)
                    .ok_or_else(|| AppError::Session(format!("flow {kind:?} not registered")))?;
                let session = Session::new(user_id, kind, definition.entry_state, flows::scratch_for(kind));
                let mut ctx = FlowCtx { user_id, session, deps: self.deps.clone() };
                let outcome = definition.enter(&mut ctx, event).await?;
                return self.store(ctx, outcome).await;
            }
        }

        let Some(session) = self.deps.sessions.get(user_id).await? else {
            // stray event with no active flow: ignore
            return Ok(());
        };
        let definition = self
            .flow(session.flow)
            .ok_or_else(|| AppError::Session(format!("flow {:?} not registered", session.flow)))?;
        let mut ctx = FlowCtx { user_id, session, deps: self.deps.clone() };
        let outcome = definition.dispatch(&mut ctx, event).await?;
        self.store(ctx, outcome).await
    }

    async fn store(&self, ctx: FlowCtx, outcome: Outcome) -> AppResult<()> {
        match outcome {
            Outcome::Persist => self.deps.sessions.put(&ctx.session).await,
            Outcome::End => self.deps.sessions.delete(ctx.user_id).await,
            Outcome::Ignored => Ok(()),
        }
    }

    /// Renders a top-level menu over the pressed message, enforcing section
    /// access
    async fn show_menu(&self, user_id: i64, message_id: i64, target: &str) -> AppResult<()> {
        let markup = match target {
            section::ADMIN => {
                if !access::is_admin(&self.deps.cache, user_id).await? {
                    return self.deny_menu(user_id, message_id).await;
                }
                keyboards::admin_panel()
            }
            section::DOCTORS => {
                if !access::is_admin(&self.deps.cache, user_id).await? {
                    return self.deny_menu(user_id, message_id).await;
                }
                keyboards::doctors_menu()
            }
            section::STATS => {
                if !access::is_privileged(&self.deps.cache, user_id).await? {
                    return self.deny_menu(user_id, message_id).await;
                }
                keyboards::stats_menu()
            }
            section::ADMINS => {
                if !access::is_privileged(&self.deps.cache, user_id).await? {
                    return self.deny_menu(user_id, message_id).await;
                }
                keyboards::admins_menu()
            }
            _ => {
                let is_admin = access::is_admin(&self.deps.cache, user_id).await?;
                keyboards::main_menu(is_admin)
            }
        };
        self.deps
            .renderer
            .edit(user_id, message_id, &texts::menu_desc(), Some(markup))
            .await?;
        Ok(())
    }

    async fn deny_menu(&self, user_id: i64, message_id: i64) -> AppResult<()> {
        self.deps
            .renderer
            .edit(
                user_id,
                message_id,
                texts::LACK_OF_PRIVILEGES,
                Some(keyboards::back_to_menu(section::MAIN)),
            )
            .await?;
        Ok(())
    }

    /// /start command: register the user and show the top-level menu
    pub async fn start_command(&self, user_id: i64, username: Option<&str>) -> AppResult<()> {
        self.deps.sessions.delete(user_id).await?;
        self.deps.directory.ensure_user(user_id, username).await?;
        flows::send_main_menu(&self.deps, user_id).await
    }
}
