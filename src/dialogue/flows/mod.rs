//! The nine concrete flow definitions

pub mod appointment;
pub mod callback_request;
pub mod create_admin;
pub mod create_doctor;
pub mod delete_admin;
pub mod delete_doctor;
pub mod feedback;
pub mod statistics;
pub mod update_doctor;

use crate::core::error::AppResult;
use crate::dialogue::access;
use crate::dialogue::engine::{Deps, FlowDefinition};
use crate::dialogue::event::split_command;
use crate::dialogue::keyboards;
use crate::dialogue::session::{FlowKind, Scratch};
use crate::dialogue::texts;

/// All flow definitions, one per `FlowKind`
pub fn definitions() -> Vec<FlowDefinition> {
    vec![
        create_doctor::definition(),
        update_doctor::definition(),
        delete_doctor::definition(),
        create_admin::definition(),
        delete_admin::definition(),
        appointment::definition(),
        callback_request::definition(),
        feedback::definition(),
        statistics::definition(),
    ]
}

/// Maps a flow-entry button press to its flow
pub fn entry_for(data: &str) -> Option<FlowKind> {
    match split_command(data) {
        ("doctor", Some("create")) => Some(FlowKind::CreateDoctor),
        ("doctor", Some("update")) => Some(FlowKind::UpdateDoctor),
        ("doctor", Some("delete")) => Some(FlowKind::DeleteDoctor),
        ("admin", Some("create")) => Some(FlowKind::CreateAdmin),
        ("admin", Some("delete")) => Some(FlowKind::DeleteAdmin),
        ("appointment", Some("start")) => Some(FlowKind::Appointment),
        ("callback", Some("start")) => Some(FlowKind::CallbackRequest),
        ("feedback", Some("start")) => Some(FlowKind::Feedback),
        ("stats", Some(_)) => Some(FlowKind::Statistics),
        _ => None,
    }
}

/// Fresh scratch space for a flow
pub fn scratch_for(kind: FlowKind) -> Scratch {
    match kind {
        FlowKind::CreateDoctor => create_doctor::scratch(),
        FlowKind::UpdateDoctor => update_doctor::scratch(),
        FlowKind::DeleteDoctor => delete_doctor::scratch(),
        FlowKind::CreateAdmin => create_admin::scratch(),
        FlowKind::DeleteAdmin => delete_admin::scratch(),
        FlowKind::Appointment => appointment::scratch(),
        FlowKind::CallbackRequest => callback_request::scratch(),
        FlowKind::Feedback => feedback::scratch(),
        FlowKind::Statistics => statistics::scratch(),
    }
}

/// Sends the top-level menu, admin-aware
pub async fn send_main_menu(deps: &Deps, user_id: i64) -> AppResult<()> {
    let is_admin = access::is_admin(&deps.cache, user_id).await?;
    deps.renderer
        .send(user_id, &texts::menu_desc(), Some(keyboards::main_menu(is_admin)))
        .await?;
    Ok(())
}
