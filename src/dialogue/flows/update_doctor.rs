//! Doctor update flow
//!
//! Field-by-field editing of an existing doctor: scalar sections loop back
//! to the section menu after each change, the speciality section branches
//! into add/remove sub-flows, and the price section edits one
//! (speciality, price) pair. Removing the entire speciality set is rejected
//! before any mutation — a doctor always keeps at least one speciality.

use crate::cache::CacheKey;
use crate::core::error::{AppError, AppResult};
use crate::core::validation;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern, MessagePayload};
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::session::{DoctorCard, FlowKind, RosterEntry, Scratch, UpdateDoctorForm};
use crate::dialogue::texts;
use crate::storage::directory::DoctorField;

pub mod state {
    pub const DOCTOR: &str = "doctor";
    pub const SECTION: &str = "section";
    pub const NEW_VALUE: &str = "new_value";
    pub const SPEC_ACTION: &str = "spec_action";
    pub const SPEC_ADD: &str = "spec_add";
    pub const ADD_PRICE: &str = "add_price";
    pub const SPEC_DEL: &str = "spec_del";
    pub const PRICE_SPEC: &str = "price_spec";
    pub const PRICE_VALUE: &str = "price_value";
}

pub fn scratch() -> Scratch {
    Scratch::UpdateDoctor(UpdateDoctorForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::UpdateDoctor,
        entry_state: state::DOCTOR,
        entry_guard: Guard::Admin,
        entry,
        transitions: vec![
            Transition::new(state::DOCTOR, EventPattern::ButtonNamespace("pick"), pick_doctor),
            Transition::new(state::SECTION, EventPattern::ButtonNamespace("sect"), pick_section),
            Transition::new(state::NEW_VALUE, EventPattern::Document, set_photo),
            Transition::new(state::NEW_VALUE, EventPattern::ButtonNamespace("degree"), set_degree),
            Transition::new(state::NEW_VALUE, EventPattern::ButtonNamespace("qual"), set_qual_category),
            Transition::new(state::NEW_VALUE, EventPattern::Text, set_text_value),
            Transition::new(state::SPEC_ACTION, EventPattern::ButtonNamespace("act"), pick_action),
            Transition::new(state::SPEC_ADD, EventPattern::ButtonNamespace("spec"), toggle_addition),
            Transition::new(state::SPEC_ADD, EventPattern::Button("specnew"), ask_new_specialities),
            Transition::new(state::SPEC_ADD, EventPattern::Button("done"), finish_addition_selection),
            Transition::new(state::SPEC_ADD, EventPattern::Text, collect_new_specialities),
            Transition::new(state::ADD_PRICE, EventPattern::Text, get_addition_price),
            Transition::new(state::SPEC_DEL, EventPattern::ButtonNamespace("spec"), toggle_removal),
            Transition::new(state::SPEC_DEL, EventPattern::Button("done"), commit_removal),
            Transition::new(state::PRICE_SPEC, EventPattern::ButtonNamespace("spec"), pick_price_speciality),
            Transition::new(state::PRICE_VALUE, EventPattern::Text, set_price),
        ],
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        let doctors = ctx.deps.directory.get_doctors().await?;
        let form = ctx.session.scratch.update_doctor()?;
        form.doctors = doctors
            .iter()
            .map(|doctor| DoctorCard {
                id: doctor.id,
                full_name: doctor.full_name.clone(),
                photo: doctor.photo.clone(),
            })
            .collect();
        let roster: Vec<RosterEntry> = form
            .doctors
            .iter()
            .map(|card| RosterEntry {
                id: card.id,
                name: validation::transform_name(&card.full_name),
            })
            .collect();
        let markup = keyboards::roster_pick(&roster, section::DOCTORS);
        ctx.edit_anchor(texts::ASK_TO_CHOOSE_DOCTOR, Some(markup)).await?;
        Ok(Step::Stay)
    })
}

fn pick_doctor<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(id) = event.button_arg().and_then(|arg| arg.parse::<i64>().ok()) else {
            return Ok(Step::Stay);
        };
        let Some(doctor) = ctx.deps.directory.get_doctor(id).await? else {
            return Ok(Step::Stay);
        };
        let form = ctx.session.scratch.update_doctor()?;
        form.doctor_id = Some(id);
        form.doctor_name = doctor.full_name.clone();
        form.current = doctor.specialities.iter().map(|sp| sp.title.clone()).collect();
        let prompt = texts::ask_to_choose_section(&form.doctor_name);
        ctx.edit_anchor(&prompt, Some(keyboards::doctor_sections(section::DOCTORS)))
            .await?;
        Ok(Step::Goto(state::SECTION))
    })
}

fn pick_section<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(arg) = event.button_arg() else { return Ok(Step::Stay) };
        match arg {
            "speciality" => {
                let name = ctx.session.scratch.update_doctor()?.doctor_name.clone();
                ctx.edit_anchor(
                    &texts::ask_to_choose_action(&name),
                    Some(keyboards::speciality_actions(section::DOCTORS)),
                )
                .await?;
                Ok(Step::Goto(state::SPEC_ACTION))
            }
            "price" => {
                let form = ctx.session.scratch.update_doctor()?;
                let name = form.doctor_name.clone();
                let markup = keyboards::speciality_pick(&form.current, section::DOCTORS);
                ctx.edit_anchor(&texts::doc_specialities(&name), Some(markup)).await?;
                Ok(Step::Goto(state::PRICE_SPEC))
            }
            field_name => {
                let Some(field) = DoctorField::from_str(field_name) else {
                    return Ok(Step::Stay);
                };
                let form = ctx.session.scratch.update_doctor()?;
                form.section = Some(field_name.to_string());
                let doctor_id = form.doctor_id.unwrap_or_default();
                let name = form.doctor_name.clone();

                let doctor = ctx.deps.directory.get_doctor(doctor_id).await?;
                let current = doctor.as_ref().and_then(|doc| match field {
                    DoctorField::FullName => Some(doc.full_name.clone()),
                    DoctorField::Description => Some(doc.description.clone()),
                    DoctorField::Experience => doc.experience.map(|exp| exp.to_string()),
                    DoctorField::ScienceDegree => doc.science_degree.clone(),
                    DoctorField::QualCategory => doc.qual_category.clone(),
                    DoctorField::Photo => None,
                });

                let (prompt, markup) = match field {
                    DoctorField::FullName => (texts::ASK_DOCTOR_NAME, keyboards::back_to_menu(section::DOCTORS)),
                    DoctorField::Photo => (texts::ASK_DOCTOR_PHOTO, keyboards::back_to_menu(section::DOCTORS)),
                    DoctorField::Description => {
                        (texts::ASK_DOCTOR_DESCRIPTION, keyboards::back_to_menu(section::DOCTORS))
                    }
                    DoctorField::Experience => {
                        (texts::ASK_DOCTOR_EXPERIENCE, keyboards::back_to_menu(section::DOCTORS))
                    }
                    DoctorField::ScienceDegree => (texts::ASK_DOCTOR_SCIENCE_DEGREE, keyboards::science_degrees()),
                    DoctorField::QualCategory => (texts::ASK_DOCTOR_QUAL_CATEGORY, keyboards::qual_categories()),
                };
                let text = format!("{}\n\n{prompt}", texts::current_value(&name, current.as_deref()));
                ctx.edit_anchor(&text, Some(markup)).await?;
                Ok(Step::Goto(state::NEW_VALUE))
            }
        }
    })
}

/// Applies one scalar field update and loops back to the section menu
async fn apply_field(ctx: &mut FlowCtx, field: DoctorField, value: Option<&str>) -> AppResult<Step> {
    let form = ctx.session.scratch.update_doctor()?;
    let doctor_id = form
        .doctor_id
        .ok_or_else(|| AppError::Session("doctor not picked".to_string()))?;
    if field == DoctorField::FullName {
        form.doctor_name = value.unwrap_or_default().to_string();
    }
    let name = form.doctor_name.clone();
    ctx.deps.directory.update_doctor_field(doctor_id, field, value).await?;
    log::info!(
        "admin {} updated {} of doctor {}",
        ctx.user_id,
        field.as_str(),
        doctor_id
    );
    ctx.edit_anchor(texts::SUCCESSFUL_PARAMETER_CHANGE, None).await?;
    ctx.replace_anchor(
        &texts::ask_to_choose_section(&name),
        Some(keyboards::doctor_sections(section::DOCTORS)),
    )
    .await?;
    Ok(Step::Goto(state::SECTION))
}

fn current_field(ctx: &mut FlowCtx) -> AppResult<Option<DoctorField>> {
    Ok(ctx
        .session
        .scratch
        .update_doctor()?
        .section
        .as_deref()
        .and_then(DoctorField::from_str))
}

fn set_text_value<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let Some(field) = current_field(ctx)? else { return Ok(Step::Stay) };
        match field {
            DoctorField::FullName => {
                let value = validation::normalize_input(text, ' ').join(" ");
                ctx.discard_event_message(event).await;
                apply_field(ctx, field, Some(&value)).await
            }
            DoctorField::Description => {
                let value = validation::normalize_input(text, ',').join(", ");
                ctx.discard_event_message(event).await;
                apply_field(ctx, field, Some(&value)).await
            }
            DoctorField::Experience => {
                if !validation::check_integer(text) {
                    ctx.discard_event_message(event).await;
                    ctx.edit_anchor(
                        texts::ASK_DOCTOR_EXPERIENCE_AGAIN,
                        Some(keyboards::back_to_menu(section::DOCTORS)),
                    )
                    .await?;
                    return Ok(Step::Stay);
                }
                let value = validation::parse_integer(text)?.to_string();
                ctx.discard_event_message(event).await;
                apply_field(ctx, field, Some(&value)).await
            }
            DoctorField::Photo => {
                // the photo must arrive as a document
                ctx.discard_event_message(event).await;
                ctx.edit_anchor(
                    texts::ASK_DOCTOR_PHOTO_AGAIN,
                    Some(keyboards::back_to_menu(section::DOCTORS)),
                )
                .await?;
                Ok(Step::Stay)
            }
            DoctorField::ScienceDegree | DoctorField::QualCategory => Ok(Step::Stay),
        }
    })
}

fn set_photo<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Event::Message { payload: MessagePayload::Document { file_id }, .. } = event else {
            return Ok(Step::Stay);
        };
        if current_field(ctx)? != Some(DoctorField::Photo) {
            return Ok(Step::Stay);
        }
        let file_id = file_id.clone();
        ctx.discard_event_message(event).await;
        apply_field(ctx, DoctorField::Photo, Some(&file_id)).await
    })
}

fn set_degree<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if current_field(ctx)? != Some(DoctorField::ScienceDegree) {
            return Ok(Step::Stay);
        }
        let value = match event.button_arg() {
            Some("phd") => Some("Доктор мед. наук"),
            Some("pre_phd") => Some("Кандидат мед. наук"),
            _ => None,
        };
        apply_field(ctx, DoctorField::ScienceDegree, value).await
    })
}

fn set_qual_category<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if current_field(ctx)? != Some(DoctorField::QualCategory) {
            return Ok(Step::Stay);
        }
        let value = match event.button_arg() {
            Some("highest") => Some("Высшая"),
            Some("first") => Some("Первая"),
            Some("second") => Some("Вторая"),
            _ => None,
        };
        apply_field(ctx, DoctorField::QualCategory, value).await
    })
}

fn pick_action<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        match event.button_arg() {
            Some("add") => {
                let catalog = ctx.deps.cache.read_titles(CacheKey::Specialities).await?;
                let form = ctx.session.scratch.update_doctor()?;
                form.catalog = catalog
                    .into_iter()
                    .filter(|title| !form.current.contains(title))
                    .collect();
                form.selected.clear();
                let markup = keyboards::speciality_toggle(&form.catalog, &form.selected, section::DOCTORS, true);
                ctx.edit_anchor(texts::ASK_TO_SPECIFY_SPECIALITIES_TO_ADD, Some(markup))
                    .await?;
                Ok(Step::Goto(state::SPEC_ADD))
            }
            Some("del") => {
                let form = ctx.session.scratch.update_doctor()?;
                form.selected.clear();
                let markup = keyboards::speciality_toggle(&form.current, &form.selected, section::DOCTORS, false);
                ctx.edit_anchor(texts::ASK_TO_SPECIFY_SPECIALITIES_TO_DEL, Some(markup))
                    .await?;
                Ok(Step::Goto(state::SPEC_DEL))
            }
            _ => Ok(Step::Stay),
        }
    })
}

fn toggle_addition<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(index) = event.button_arg().and_then(|arg| arg.parse::<usize>().ok()) else {
            return Ok(Step::Stay);
        };
        let form = ctx.session.scratch.update_doctor()?;
        if let Some(title) = form.catalog.get(index).cloned() {
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
        let form = ctx.session.scratch.update_doctor()?;
        for title in entries {
            if !form.catalog.contains(&title) && !form.current.contains(&title) {
                form.selected.push(title);
            }
        }
        ctx.session.pending_deletes.push(event.message_id());
        Ok(Step::Stay)
    })
}

fn finish_addition_selection<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.update_doctor()?;
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
        form.prices = Vec::new();
        form.unpriced = form.selected.clone();
        let first = form.unpriced[0].clone();
        ctx.flush_pending().await;
        ctx.edit_anchor(
            &texts::ask_doctor_price(&first, false),
            Some(keyboards::back_to_menu(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::ADD_PRICE))
    })
}

fn get_addition_price<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        if !validation::check_integer(text) {
            let current = ctx.session.scratch.update_doctor()?.unpriced[0].clone();
            ctx.discard_event_message(event).await;
            ctx.edit_anchor(
                &texts::ask_doctor_price(&current, true),
                Some(keyboards::back_to_menu(section::DOCTORS)),
            )
            .await?;
            return Ok(Step::Stay);
        }
        let price = validation::parse_integer(text)?;
        let form = ctx.session.scratch.update_doctor()?;
        form.prices.push(price);
        form.unpriced.remove(0);
        let next = form.unpriced.first().cloned();
        ctx.discard_event_message(event).await;

        if let Some(speciality) = next {
            ctx.edit_anchor(
                &texts::ask_doctor_price(&speciality, false),
                Some(keyboards::back_to_menu(section::DOCTORS)),
            )
            .await?;
            return Ok(Step::Stay);
        }

        // all prices collected: persist the additions
        let form = ctx.session.scratch.update_doctor()?.clone();
        let doctor_id = form
            .doctor_id
            .ok_or_else(|| AppError::Session("doctor not picked".to_string()))?;
        let known = ctx.deps.cache.read_titles(CacheKey::Specialities).await?;
        let mut catalog_changed = false;
        for (title, &price) in form.selected.iter().zip(form.prices.iter()) {
            if !known.contains(title) {
                ctx.deps.directory.create_speciality(title).await?;
                log::info!("admin {} created speciality \"{}\"", ctx.user_id, title);
                catalog_changed = true;
            }
            ctx.deps.directory.add_doctor_speciality(doctor_id, title, price).await?;
        }
        log::info!(
            "admin {} added specialities \"{}\" to doctor {}",
            ctx.user_id,
            form.selected.join(", "),
            doctor_id
        );
        if catalog_changed {
            ctx.deps.cache.invalidate(&[CacheKey::Specialities]).await?;
        }

        let updated = ctx.session.scratch.update_doctor()?;
        updated.current.extend(form.selected);
        updated.selected = Vec::new();
        updated.prices = Vec::new();
        updated.unpriced = Vec::new();
        let name = updated.doctor_name.clone();

        ctx.edit_anchor(texts::SUCCESSFUL_PARAMETER_CHANGE, None).await?;
        ctx.replace_anchor(
            &texts::ask_to_choose_section(&name),
            Some(keyboards::doctor_sections(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::SECTION))
    })
}

fn toggle_removal<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(index) = event.button_arg().and_then(|arg| arg.parse::<usize>().ok()) else {
            return Ok(Step::Stay);
        };
        let form = ctx.session.scratch.update_doctor()?;
        if let Some(title) = form.current.get(index).cloned() {
            if let Some(pos) = form.selected.iter().position(|t| *t == title) {
                form.selected.remove(pos);
            } else {
                form.selected.push(title);
            }
        }
        let markup = keyboards::speciality_toggle(&form.current, &form.selected, section::DOCTORS, false);
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, Some(markup)).await?;
        }
        Ok(Step::Stay)
    })
}

fn commit_removal<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.update_doctor()?;
        if form.selected.is_empty() {
            return Ok(Step::Stay);
        }
        // checked before any mutation: the doctor must keep >= 1 speciality
        if form.selected.len() >= form.current.len() {
            let markup = keyboards::speciality_toggle(&form.current, &form.selected, section::DOCTORS, false);
            let text = format!(
                "{}\n\n{}",
                texts::WARN_NOT_TO_CHOOSE_ALL_SPECIALITIES,
                texts::ASK_TO_SPECIFY_SPECIALITIES_TO_DEL
            );
            ctx.edit_anchor(&text, Some(markup)).await?;
            return Ok(Step::Stay);
        }

        let form = ctx.session.scratch.update_doctor()?.clone();
        let doctor_id = form
            .doctor_id
            .ok_or_else(|| AppError::Session("doctor not picked".to_string()))?;
        let mut catalog_changed = false;
        for title in &form.selected {
            ctx.deps.directory.remove_doctor_speciality(doctor_id, title).await?;
            if ctx.deps.directory.get_doctors_by_speciality(title).await?.is_empty() {
                ctx.deps.directory.delete_speciality(title).await?;
                log::info!("admin {} deleted speciality \"{}\"", ctx.user_id, title);
                catalog_changed = true;
            }
        }
        log::info!(
            "admin {} removed specialities \"{}\" from doctor {}",
            ctx.user_id,
            form.selected.join(", "),
            doctor_id
        );
        if catalog_changed {
            ctx.deps.cache.invalidate(&[CacheKey::Specialities]).await?;
        }

        let updated = ctx.session.scratch.update_doctor()?;
        updated.current.retain(|title| !form.selected.contains(title));
        updated.selected = Vec::new();
        let name = updated.doctor_name.clone();

        ctx.edit_anchor(texts::SUCCESSFUL_PARAMETER_CHANGE, None).await?;
        ctx.replace_anchor(
            &texts::ask_to_choose_section(&name),
            Some(keyboards::doctor_sections(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::SECTION))
    })
}

fn pick_price_speciality<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(index) = event.button_arg().and_then(|arg| arg.parse::<usize>().ok()) else {
            return Ok(Step::Stay);
        };
        let form = ctx.session.scratch.update_doctor()?;
        let Some(title) = form.current.get(index).cloned() else {
            return Ok(Step::Stay);
        };
        form.price_speciality = Some(title.clone());
        ctx.edit_anchor(
            &texts::ask_doctor_price(&title, false),
            Some(keyboards::back_to_menu(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::PRICE_VALUE))
    })
}

fn set_price<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let speciality = ctx
            .session
            .scratch
            .update_doctor()?
            .price_speciality
            .clone()
            .unwrap_or_default();
        if !validation::check_integer(text) {
            ctx.discard_event_message(event).await;
            ctx.edit_anchor(
                &texts::ask_doctor_price(&speciality, true),
                Some(keyboards::back_to_menu(section::DOCTORS)),
            )
            .await?;
            return Ok(Step::Stay);
        }
        let price = validation::parse_integer(text)?;
        let form = ctx.session.scratch.update_doctor()?;
        let doctor_id = form
            .doctor_id
            .ok_or_else(|| AppError::Session("doctor not picked".to_string()))?;
        let name = form.doctor_name.clone();
        ctx.discard_event_message(event).await;
        ctx.deps.directory.set_doctor_price(doctor_id, &speciality, price).await?;
        log::info!(
            "admin {} set price {} for \"{}\" of doctor {}",
            ctx.user_id,
            price,
            speciality,
            doctor_id
        );
        ctx.edit_anchor(texts::SUCCESSFUL_PARAMETER_CHANGE, None).await?;
        ctx.replace_anchor(
            &texts::ask_to_choose_section(&name),
            Some(keyboards::doctor_sections(section::DOCTORS)),
        )
        .await?;
        Ok(Step::Goto(state::SECTION))
    })
}
