//! Doctor creation flow
//!
//! Collects a variable-length set of (speciality, price) pairs plus the
//! doctor's profile. Prices are gathered through a work queue: the selected
//! specialities are copied into `unpriced`, the price state loops popping
//! the head until the queue drains, and `prices[i]` ends up paired with
//! `selected[i]` by position.

use crate::cache::CacheKey;
use crate::core::error::AppError;
use crate::core::validation;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern, MessagePayload};
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{DoctorForm, FlowKind, Scratch};
use crate::dialogue::texts;
use crate::storage::directory::{Doctor, NewDoctor, SpecialityPrice};

pub mod state {
    pub const SPECIALITY: &str = "speciality";
    pub const NAME: &str = "name";
    pub const PHOTO: &str = "photo";
    pub const DESCRIPTION: &str = "description";
    pub const EXPERIENCE_CHOICE: &str = "experience_choice";
    pub const EXPERIENCE: &str = "experience";
    pub const SCIENCE_DEGREE: &str = "science_degree";
    pub const QUAL_CATEGORY: &str = "qual_category";
    pub const PRICE: &str = "price";
    pub const CONFIRMATION: &str = "confirmation";
}

pub fn scratch() -> Scratch {
    Scratch::CreateDoctor(DoctorForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::CreateDoctor,
        entry_state: state::SPECIALITY,
        entry_guard: Guard::Admin,
        entry,
        transitions: vec![
            Transition::new(state::SPECIALITY, EventPattern::ButtonNamespace("spec"), toggle_speciality),
            Transition::new(state::SPECIALITY, EventPattern::Button("specnew"), ask_new_specialities),
            Transition::new(state::SPECIALITY, EventPattern::Button("done"), finish_selection),
            Transition::new(state::SPECIALITY, EventPattern::Text, collect_new_specialities),
            Transition::new(state::NAME, EventPattern::Text, get_name),
            Transition::new(state::PHOTO, EventPattern::Document, get_photo),
            Transition::new(state::PHOTO, EventPattern::AnyMessage, reject_photo),
            Transition::new(state::DESCRIPTION, EventPattern::Text, get_description),
            Transition::new(state::EXPERIENCE_CHOICE, EventPattern::ButtonNamespace("exp"), experience_choice),
            Transition::new(state::EXPERIENCE, EventPattern::Text, get_experience),
            Transition::new(state::SCIENCE_DEGREE, EventPattern::ButtonNamespace("degree"), get_science_degree),
            Transition::new(state::QUAL_CATEGORY, EventPattern::ButtonNamespace("qual"), get_qual_category),
            Transition::new(state::PRICE, EventPattern::Text, get_price),
            // the privilege check is re-evaluated at commit time
            Transition::guarded(state::CONFIRMATION, EventPattern::Button("confirm"), Guard::Admin, commit),
            Transition::new(state::CONFIRMATION, EventPattern::Button("change"), restart),
        ],
    }
}

/// Maps a degree/category callback argument to its stored value
fn science_degree_value(arg: &str) -> Option<String> {
    match arg {
        "phd" => Some("Доктор мед. наук".to_string()),
        "pre_phd" => Some("Кандидат мед. наук".to_string()),
        _ => None,
    }
}

fn qual_category_value(arg: &str) -> Option<String> {
    match arg {
        "highest" => Some("Высшая".to_string()),
        "first" => Some("Первая".to_string()),
        "second" => Some("Вторая".to_string()),
        _ => None,
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        let catalog = ctx.deps.cache.read_titles(CacheKey::Specialities).await?;
        let form = ctx.session.scratch.doctor()?;
        form.catalog = catalog;
        let markup = keyboards::speciality_toggle(&form.catalog, &form.selected, section::DOCTORS, true);
        ctx.edit_anchor(texts::ASK_TO_CHOOSE_SPECIALITIES, Some(markup)).await?;
        Ok(Step::Stay)
    })
}

fn toggle_speciality<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let index: usize = event
            .button_arg()
            .and_then(|arg| arg.parse().ok())
            .ok_or_else(|| AppError::Validation("malformed speciality index".to_string()))?;
        let form = ctx.session.scratch.doctor()?;
        if let Some(title) = form.catalog.get(index).cloned() {
            // selecting an already-selected item removes it
            if let Some(pos) = form.selected.iter().position(|t| *t == title) {
                form.selected.remove(pos);
            } else {
                form.selected.push(title);
            }
        }
        let markup = keyboards::speciality_toggle(&form.catalog, &form.selected, section::DOCTORS, true);
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, Some(markup)).await?;
        }
        Ok(Step::Stay)
    })
}

fn ask_new_specialities<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let id = ctx
            .deps
            .renderer
            .send(ctx.user_id, texts::ASK_TO_ADD_NEW_SPECIALITIES, None)
            .await?;
        ctx.session.pending_deletes.push(id);
        Ok(Step::Stay)
    })
}

fn collect_new_specialities<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let entries = validation::normalize_input(text, ',');
        let form = ctx.session.scratch.doctor()?;
        // deduplicate against the existing catalog only; the in-progress
        // selection is set-deduplicated at submission
        for title in entries {
            if !form.catalog.contains(&title) {
                form.selected.push(title);
            }
        }
        ctx.session.pending_deletes.push(event.message_id());
        Ok(Step::Stay)
    })
}

fn finish_selection<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.doctor()?;
        if form.selected.is_empty() {
            return Ok(Step::Stay);
        }
        let mut deduped: Vec<String> = Vec::new();
        for title in form.selected.drain(..) {
            if !deduped.contains(&title) {
                deduped.push(title);
            }
        }
        form.selected = deduped;
        ctx.flush_pending().await;
        ctx.edit_anchor(texts::ASK_DOCTOR_NAME, Some(keyboards::back_to_menu(section::DOCTORS)))
            .await?;
        Ok(Step::Goto(state::NAME))
    })
}

fn get_name<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let name = validation::normalize_input(text, ' ').join(" ");
        ctx.session.scratch.doctor()?.name = name;
        ctx.discard_event_message(event).await;
        ctx.edit_anchor(texts::ASK_DOCTOR_PHOTO, Some(keyboards::back_to_menu(section::DOCTORS)))
            .await?;
        Ok(Step::Goto(state::PHOTO))
    })
}

fn get_photo<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Event::Message { payload: MessagePayload::Document { file_id }, .. } = event else {
            return Ok(Step::Stay);
        };
        ctx.session.scratch.doctor()?.photo = file_id.clone();
        ctx.discard_event_message(event).await;
        ctx.edit_anchor(
            texts::ASK_DOCTOR_DESCRIPTION,
            Some(keyboards::back_to_menu(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::DESCRIPTION))
    })
}

fn reject_photo<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        ctx.discard_event_message(event).await;
        ctx.edit_anchor(
            texts::ASK_DOCTOR_PHOTO_AGAIN,
            Some(keyboards::back_to_menu(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Stay)
    })
}

fn get_description<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let description = validation::normalize_input(text, ',').join(", ");
        ctx.session.scratch.doctor()?.description = description;
        ctx.discard_event_message(event).await;
        ctx.edit_anchor(texts::ASK_TO_CHOOSE_EXPERIENCE, Some(keyboards::experience_choice()))
            .await?;
        Ok(Step::Goto(state::EXPERIENCE_CHOICE))
    })
}

fn experience_choice<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if event.button_arg() == Some("yes") {
            ctx.edit_anchor(
                texts::ASK_DOCTOR_EXPERIENCE,
                Some(keyboards::back_to_menu(section::DOCTORS)),
            )
            .await?;
            Ok(Step::Goto(state::EXPERIENCE))
        } else {
            ctx.session.scratch.doctor()?.experience = None;
            ctx.edit_anchor(texts::ASK_DOCTOR_SCIENCE_DEGREE, Some(keyboards::science_degrees()))
                .await?;
            Ok(Step::Goto(state::SCIENCE_DEGREE))
        }
    })
}

fn get_experience<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        if !validation::check_integer(text) {
            ctx.discard_event_message(event).await;
            ctx.edit_anchor(
                texts::ASK_DOCTOR_EXPERIENCE_AGAIN,
                Some(keyboards::back_to_menu(section::DOCTORS)),
            )
            .await?;
            return Ok(Step::Stay);
        }
        ctx.session.scratch.doctor()?.experience = Some(validation::parse_integer(text)?);
        ctx.discard_event_message(event).await;
        ctx.edit_anchor(texts::ASK_DOCTOR_SCIENCE_DEGREE, Some(keyboards::science_degrees()))
            .await?;
        Ok(Step::Goto(state::SCIENCE_DEGREE))
    })
}

fn get_science_degree<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let degree = event.button_arg().and_then(science_degree_value);
        ctx.session.scratch.doctor()?.science_degree = degree;
        ctx.edit_anchor(texts::ASK_DOCTOR_QUAL_CATEGORY, Some(keyboards::qual_categories()))
            .await?;
        Ok(Step::Goto(state::QUAL_CATEGORY))
    })
}

fn get_qual_category<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let category = event.button_arg().and_then(qual_category_value);
        let form = ctx.session.scratch.doctor()?;
        form.qual_category = category;
        form.prices = Vec::new();
        form.unpriced = form.selected.clone();
        let first = form.unpriced[0].clone();
        ctx.edit_anchor(
            &texts::ask_doctor_price(&first, false),
            Some(keyboards::back_to_menu(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::PRICE))
    })
}

fn get_price<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        if !validation::check_integer(text) {
            let current = ctx.session.scratch.doctor()?.unpriced[0].clone();
            ctx.discard_event_message(event).await;
            ctx.edit_anchor(
                &texts::ask_doctor_price(&current, true),
                Some(keyboards::back_to_menu(section::DOCTORS)),
            )
            .await?;
            return Ok(Step::Stay);
        }
        let price = validation::parse_integer(text)?;
        let form = ctx.session.scratch.doctor()?;
        form.prices.push(price);
        form.unpriced.remove(0);
        let next = form.unpriced.first().cloned();
        ctx.discard_event_message(event).await;
        match next {
            Some(speciality) => {
                ctx.edit_anchor(
                    &texts::ask_doctor_price(&speciality, false),
                    Some(keyboards::back_to_menu(section::DOCTORS)),
                )
                .await?;
                Ok(Step::Stay)
            }
            None => {
                // the confirmation card carries the photo, and a text
                // message cannot be edited into a photo one
                if let Some(anchor) = ctx.session.anchor.take() {
                    let _ = ctx.deps.renderer.delete(ctx.user_id, anchor).await;
                }
                let form = ctx.session.scratch.doctor()?;
                let caption = texts::doctor_card(&preview(form));
                let photo = form.photo.clone();
                let id = ctx
                    .deps
                    .renderer
                    .send_photo(
                        ctx.user_id,
                        &photo,
                        &caption,
                        Some(keyboards::confirmation_menu(section::DOCTORS)),
                    )
                    .await?;
                ctx.session.anchor = Some(id);
                Ok(Step::Goto(state::CONFIRMATION))
            }
        }
    })
}

/// Doctor preview for the confirmation card, before anything is persisted
fn preview(form: &DoctorForm) -> Doctor {
    Doctor {
        id: 0,
        full_name: form.name.clone(),
        photo: form.photo.clone(),
        description: form.description.clone(),
        experience: form.experience,
        science_degree: form.science_degree.clone(),
        qual_category: form.qual_category.clone(),
        specialities: form
            .selected
            .iter()
            .zip(form.prices.iter())
            .map(|(title, &price)| SpecialityPrice { title: title.clone(), price })
            .collect(),
    }
}

fn commit<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.doctor()?.clone();
        debug_assert_eq!(form.selected.len(), form.prices.len());

        let mut catalog_changed = false;
        for title in &form.selected {
            if !form.catalog.contains(title) {
                ctx.deps.directory.create_speciality(title).await?;
                log::info!("admin {} created speciality \"{}\"", ctx.user_id, title);
                catalog_changed = true;
            }
        }

        let doctor = NewDoctor {
            full_name: form.name.clone(),
            photo: form.photo.clone(),
            description: form.description.clone(),
            experience: form.experience,
            science_degree: form.science_degree.clone(),
            qual_category: form.qual_category.clone(),
            specialities: form
                .selected
                .iter()
                .zip(form.prices.iter())
                .map(|(title, &price)| SpecialityPrice { title: title.clone(), price })
                .collect(),
        };
        ctx.deps.directory.create_doctor(&doctor).await?;
        log::info!(
            "admin {} created doctor \"{}\" with specialities \"{}\"",
            ctx.user_id,
            form.name,
            form.selected.join(", ")
        );

        if catalog_changed {
            ctx.deps.cache.invalidate(&[CacheKey::Specialities]).await?;
        }

        // the confirmation card is a photo message, replace it with the menu
        if let Some(anchor) = ctx.session.anchor.take() {
            let _ = ctx.deps.renderer.delete(ctx.user_id, anchor).await;
        }
        ctx.deps
            .renderer
            .send(ctx.user_id, texts::SUCCESSFUL_DOCTOR_CREATION, None)
            .await?;
        ctx.deps
            .renderer
            .send(ctx.user_id, &texts::menu_desc(), Some(keyboards::doctors_menu()))
            .await?;
        Ok(Step::Done)
    })
}

fn restart<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let catalog = ctx.deps.cache.read_titles(CacheKey::Specialities).await?;
        let form = ctx.session.scratch.doctor()?;
        *form = DoctorForm { catalog, ..DoctorForm::default() };
        let markup = keyboards::speciality_toggle(&form.catalog, &form.selected, section::DOCTORS, true);
        if let Some(anchor) = ctx.session.anchor.take() {
            let _ = ctx.deps.renderer.delete(ctx.user_id, anchor).await;
        }
        ctx.replace_anchor(texts::ASK_TO_CHOOSE_SPECIALITIES, Some(markup)).await?;
        Ok(Step::Goto(state::SPECIALITY))
    })
}
