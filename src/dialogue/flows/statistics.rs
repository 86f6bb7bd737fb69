//! Statistics flow
//!
//! Canned periods answer immediately and never create a session; the change
//! figure compares against the fixed-offset previous period. The custom
//! sub-flow collects two free-text dates and reports absolute counts only —
//! there is no well-defined "preceding custom period".

use chrono::Local;

use crate::core::stats::{self, Period};
use crate::core::validation::{self, DATE_OUTPUT_FORMAT};
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern};
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{FlowKind, Scratch, StatisticsForm};
use crate::dialogue::texts;

pub mod state {
    pub const PERIOD: &str = "period";
}

pub fn scratch() -> Scratch {
    Scratch::Statistics(StatisticsForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::Statistics,
        entry_state: state::PERIOD,
        entry_guard: Guard::Privileged,
        entry,
        transitions: vec![Transition::new(state::PERIOD, EventPattern::Text, get_period)],
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        match event.button_arg() {
            Some("custom") => {
                ctx.edit_anchor(texts::ASK_PERIOD, Some(keyboards::back_to_menu(section::STATS)))
                    .await?;
                Ok(Step::Stay)
            }
            Some(arg) => {
                let Some(period) = Period::from_arg(arg) else {
                    return Ok(Step::Done);
                };
                let end = Local::now().naive_local();
                let start = period.subtract_from(end);
                let prev_start = period.subtract_from(start);
                let report = stats::collect(ctx.deps.directory.as_ref(), start, end, Some(prev_start)).await?;
                let text = texts::statistic(&report, texts::period_caption(period), None);
                ctx.edit_anchor(&text, Some(keyboards::back_to_menu(section::STATS)))
                    .await?;
                Ok(Step::Done)
            }
            None => Ok(Step::Done),
        }
    })
}

fn get_period<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let (start, end) = match validation::parse_period(text) {
            Ok(period) => period,
            Err(_) => {
                ctx.discard_event_message(event).await;
                ctx.edit_anchor(texts::ASK_PERIOD_AGAIN, Some(keyboards::back_to_menu(section::STATS)))
                    .await?;
                return Ok(Step::Stay);
            }
        };
        ctx.discard_event_message(event).await;
        let report = stats::collect(ctx.deps.directory.as_ref(), start, end, None).await?;
        let caption = format!(
            "{} - {}",
            start.format(DATE_OUTPUT_FORMAT),
            end.format(DATE_OUTPUT_FORMAT)
        );
        let text = texts::statistic(&report, &caption, None);
        ctx.edit_anchor(&text, Some(keyboards::back_to_menu(section::STATS)))
            .await?;
        Ok(Step::Done)
    })
}
