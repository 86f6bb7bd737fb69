//! Appointment booking flow
//!
//! Branching: an offline consultation is a short four-step form (free-text
//! request, optional preferred time, communication choice, name); an online
//! one picks a speciality from a paginated catalog, then a doctor, and ends
//! with an invoice. The booking is persisted on confirmed payment; the
//! conference link is a best-effort addendum that never blocks persistence.

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::validation;
use crate::cache::CacheKey;
use crate::dialogue::engine::{FlowCtx, FlowDefinition, Guard, HandlerFuture, Step, Transition};
use crate::dialogue::event::{Event, EventPattern, MessagePayload};
use crate::dialogue::flows::send_main_menu;
use crate::dialogue::keyboards::{self, section};
use crate::dialogue::pagination::Page;
use crate::dialogue::session::{AppointmentForm, DoctorCard, FlowKind, Scratch};
use crate::dialogue::texts;
use crate::storage::directory::{CommunicationType, ConsultationType, NewAppointment};

pub mod state {
    pub const CONS_TYPE: &str = "cons_type";
    pub const REQUEST: &str = "request";
    pub const DATETIME_CHOICE: &str = "datetime_choice";
    pub const DATETIME: &str = "datetime";
    pub const COMMUNICATION: &str = "communication";
    pub const PHONE: &str = "phone";
    pub const NAME: &str = "name";
    pub const PAYMENT: &str = "payment";
}

pub fn scratch() -> Scratch {
    Scratch::Appointment(AppointmentForm::default())
}

pub fn definition() -> FlowDefinition {
    FlowDefinition {
        kind: FlowKind::Appointment,
        entry_state: state::CONS_TYPE,
        entry_guard: Guard::None,
        entry,
        transitions: vec![
            Transition::new(state::CONS_TYPE, EventPattern::ButtonNamespace("cons"), get_cons_type),
            Transition::new(state::REQUEST, EventPattern::ButtonNamespace("nav"), navigate_page),
            Transition::new(state::REQUEST, EventPattern::ButtonNamespace("spec"), get_speciality),
            Transition::new(state::REQUEST, EventPattern::ButtonNamespace("doc"), get_doctor),
            Transition::new(state::REQUEST, EventPattern::Text, get_request),
            Transition::new(state::DATETIME_CHOICE, EventPattern::Button("yes"), want_datetime),
            Transition::new(state::DATETIME_CHOICE, EventPattern::Button("no"), skip_datetime),
            Transition::new(state::DATETIME, EventPattern::Text, get_datetime),
            Transition::new(state::COMMUNICATION, EventPattern::ButtonNamespace("com"), get_com_type),
            Transition::new(state::PHONE, EventPattern::Contact, get_phone),
            Transition::new(state::PHONE, EventPattern::Text, get_phone),
            Transition::new(state::NAME, EventPattern::Text, get_name),
            Transition::new(state::PAYMENT, EventPattern::Button("pay"), start_payment),
            Transition::new(state::PAYMENT, EventPattern::Payment, process_payment),
        ],
    }
}

fn entry<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Event::Button { message_id, .. } = event {
            ctx.session.anchor = Some(*message_id);
        }
        ctx.edit_anchor(texts::ASK_CONS_TYPE, Some(keyboards::consultation_types()))
            .await?;
        Ok(Step::Stay)
    })
}

fn speciality_markup(form: &AppointmentForm) -> crate::dialogue::render::Markup {
    let page = Page::new(
        form.page,
        config::pagination::SPECIALITIES_PER_PAGE,
        form.specialities.len(),
    );
    keyboards::speciality_page(&form.specialities, &page)
}

fn get_cons_type<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        match event.button_arg() {
            Some("offline") => {
                let form = ctx.session.scratch.appointment()?;
                form.consultation = Some(ConsultationType::Offline);
                form.steps_total = "/4".to_string();
                ctx.edit_anchor(texts::ASK_REQUEST, Some(keyboards::back_to_menu(section::MAIN)))
                    .await?;
                Ok(Step::Goto(state::REQUEST))
            }
            _ => {
                let specialities = ctx.deps.cache.read_titles(CacheKey::Specialities).await?;
                let form = ctx.session.scratch.appointment()?;
                form.consultation = Some(ConsultationType::Online);
                form.steps_total = "/5".to_string();
                form.specialities = specialities;
                form.page = 0;
                let markup = speciality_markup(form);
                ctx.edit_anchor(texts::ASK_SPECIALITY, Some(markup)).await?;
                Ok(Step::Goto(state::REQUEST))
            }
        }
    })
}

fn navigate_page<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(target) = event.button_arg().and_then(|arg| arg.parse::<usize>().ok()) else {
            return Ok(Step::Stay);
        };
        let form = ctx.session.scratch.appointment()?;
        let last = Page::new(0, config::pagination::SPECIALITIES_PER_PAGE, form.specialities.len()).last_index();
        form.page = target.min(last);
        let markup = speciality_markup(form);
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, Some(markup)).await?;
        }
        Ok(Step::Stay)
    })
}

fn get_speciality<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(index) = event.button_arg().and_then(|arg| arg.parse::<usize>().ok()) else {
            return Ok(Step::Stay);
        };
        let Some(title) = ctx.session.scratch.appointment()?.specialities.get(index).cloned() else {
            return Ok(Step::Stay);
        };

        // a previous speciality choice may have left doctor cards behind
        ctx.flush_pending().await;

        let doctors = ctx.deps.directory.get_doctors_by_speciality(&title).await?;
        let header = ctx
            .deps
            .renderer
            .send(ctx.user_id, &texts::chosen_speciality(&title), None)
            .await?;
        ctx.session.pending_deletes.push(header);

        let mut cards = Vec::new();
        for doctor in &doctors {
            let card = ctx
                .deps
                .renderer
                .send_photo(
                    ctx.user_id,
                    &doctor.photo,
                    &texts::doctor_card(doctor),
                    Some(keyboards::choose_doctor(doctor.id)),
                )
                .await?;
            ctx.session.pending_deletes.push(card);
            cards.push(DoctorCard {
                id: doctor.id,
                full_name: doctor.full_name.clone(),
                photo: doctor.photo.clone(),
            });
        }

        let form = ctx.session.scratch.appointment()?;
        form.speciality = Some(title);
        form.doctors = cards;
        Ok(Step::Stay)
    })
}

fn get_doctor<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(id) = event.button_arg().and_then(|arg| arg.parse::<i64>().ok()) else {
            return Ok(Step::Stay);
        };
        let form = ctx.session.scratch.appointment()?;
        let Some(card) = form.doctors.iter().find(|card| card.id == id).cloned() else {
            return Ok(Step::Stay);
        };
        form.doctor_id = Some(id);
        form.request = card.full_name.clone();
        let speciality = form.speciality.clone().unwrap_or_default();
        let stage = format!("2{}", form.steps_total);

        ctx.flush_pending().await;
        ctx.edit_anchor(&texts::chosen_doctor(&card.full_name, &speciality), None)
            .await?;
        ctx.replace_anchor(&texts::ask_dt_choice(&stage), Some(keyboards::yes_no()))
            .await?;
        Ok(Step::Goto(state::DATETIME_CHOICE))
    })
}

fn get_request<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let form = ctx.session.scratch.appointment()?;
        if form.consultation == Some(ConsultationType::Online) {
            // free text is not an answer on the speciality screen
            ctx.discard_event_message(event).await;
            return Ok(Step::Stay);
        }
        form.doctor_id = None;
        form.speciality = None;
        form.request = text.to_string();
        let stage = format!("2{}", form.steps_total);

        ctx.discard_event_message(event).await;
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, None).await?;
        }
        ctx.replace_anchor(&texts::ask_dt_choice(&stage), Some(keyboards::yes_no()))
            .await?;
        Ok(Step::Goto(state::DATETIME_CHOICE))
    })
}

fn want_datetime<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let stage = format!("2{}", ctx.session.scratch.appointment()?.steps_total);
        ctx.edit_anchor(&texts::ask_dt(&stage), Some(keyboards::back_to_menu(section::MAIN)))
            .await?;
        Ok(Step::Goto(state::DATETIME))
    })
}

fn skip_datetime<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.appointment()?;
        form.preferred_at = None;
        let stage_now = format!("2{}", form.steps_total);
        let stage_next = format!("3{}", form.steps_total);
        ctx.edit_anchor(&texts::no_dt(&stage_now), None).await?;
        ctx.replace_anchor(&texts::ask_com_type(&stage_next), Some(keyboards::communication_types()))
            .await?;
        Ok(Step::Goto(state::COMMUNICATION))
    })
}

fn get_datetime<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let form = ctx.session.scratch.appointment()?;
        form.preferred_at = Some(text.to_string());
        let stage = format!("3{}", form.steps_total);
        ctx.discard_event_message(event).await;
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, None).await?;
        }
        ctx.replace_anchor(&texts::ask_com_type(&stage), Some(keyboards::communication_types()))
            .await?;
        Ok(Step::Goto(state::COMMUNICATION))
    })
}

fn get_com_type<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let chat = event.button_arg() == Some("chat");
        let username = event.username().map(str::to_string);
        let form = ctx.session.scratch.appointment()?;
        let stage_now = format!("3{}", form.steps_total);
        let stage_next = format!("4{}", form.steps_total);

        if !chat {
            form.communication = Some(CommunicationType::Call);
            ctx.edit_anchor(&texts::com_type_choice(&stage_now, CommunicationType::Call), None)
                .await?;
            ctx.replace_anchor(
                &texts::ask_phone(texts::APPOINTMENT_TITLE, &stage_now, false, false),
                Some(keyboards::back_to_menu(section::MAIN)),
            )
            .await?;
            return Ok(Step::Goto(state::PHONE));
        }

        form.communication = Some(CommunicationType::Chat);
        if username.is_none() {
            // no @username to chat with: fall back to phone collection
            form.username_missing = true;
            ctx.edit_anchor(&texts::com_type_choice(&stage_now, CommunicationType::Chat), None)
                .await?;
            ctx.replace_anchor(
                &texts::ask_phone(texts::APPOINTMENT_TITLE, &stage_now, false, true),
                Some(keyboards::back_to_menu(section::MAIN)),
            )
            .await?;
            Ok(Step::Goto(state::PHONE))
        } else {
            form.username_missing = false;
            form.username = username;
            form.phone = None;
            ctx.edit_anchor(&texts::com_type_choice(&stage_now, CommunicationType::Chat), None)
                .await?;
            ctx.replace_anchor(
                &texts::ask_name(texts::APPOINTMENT_TITLE, &stage_next),
                Some(keyboards::back_to_menu(section::MAIN)),
            )
            .await?;
            Ok(Step::Goto(state::NAME))
        }
    })
}

fn get_phone<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let stage_now = format!("3{}", ctx.session.scratch.appointment()?.steps_total);
        let phone = match event {
            Event::Message { payload: MessagePayload::Contact { phone }, .. } => validation::clean_phone(phone),
            _ => {
                let Some(text) = event.text() else { return Ok(Step::Stay) };
                let digits = validation::clean_phone(text);
                if !validation::check_phone(&digits) {
                    ctx.discard_event_message(event).await;
                    ctx.replace_anchor(
                        &texts::ask_phone(texts::APPOINTMENT_TITLE, &stage_now, true, false),
                        Some(keyboards::back_to_menu(section::MAIN)),
                    )
                    .await?;
                    return Ok(Step::Stay);
                }
                digits
            }
        };
        let username = event.username().map(str::to_string);
        let form = ctx.session.scratch.appointment()?;
        form.phone = Some(validation::standardize_phone(&phone));
        form.username = username;
        let stage_next = format!("4{}", form.steps_total);
        ctx.discard_event_message(event).await;
        ctx.replace_anchor(
            &texts::ask_name(texts::APPOINTMENT_TITLE, &stage_next),
            Some(keyboards::back_to_menu(section::MAIN)),
        )
        .await?;
        Ok(Step::Goto(state::NAME))
    })
}

fn build_booking(user_id: i64, form: &AppointmentForm) -> NewAppointment {
    NewAppointment {
        user_id,
        username: form.username.clone(),
        full_name: form.name.clone(),
        phone: form.phone.clone(),
        consultation: form.consultation.unwrap_or(ConsultationType::Offline),
        communication: form.communication.unwrap_or(CommunicationType::Call),
        request: form.request.clone(),
        doctor_id: form.doctor_id,
        preferred_at: form.preferred_at.clone(),
    }
}

fn get_name<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Some(text) = event.text() else { return Ok(Step::Stay) };
        let form = ctx.session.scratch.appointment()?;
        form.name = validation::normalize_input(text, ' ').join(" ");
        form.request_text = texts::appointment_request(
            &form.name,
            form.phone.as_deref(),
            form.username.as_deref(),
            form.consultation.unwrap_or(ConsultationType::Offline),
            form.communication.unwrap_or(CommunicationType::Call),
            &form.request,
            form.speciality.as_deref(),
            form.preferred_at.as_deref(),
        );
        let request_text = form.request_text.clone();
        let offline = form.consultation == Some(ConsultationType::Offline);
        let chat_with_username = form.communication == Some(CommunicationType::Chat) && !form.username_missing;
        let booking = build_booking(ctx.user_id, form);

        ctx.discard_event_message(event).await;
        let request_msg = ctx
            .deps
            .renderer
            .send(*config::REQUESTS_CHAT_ID, &request_text, None)
            .await?;
        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, None).await?;
        }

        if offline {
            ctx.deps.directory.create_appointment(&booking).await?;
            log::info!("user {} booked an offline consultation", ctx.user_id);
            if chat_with_username {
                ctx.deps.renderer.send(ctx.user_id, texts::USERNAME_WARNING, None).await?;
            }
            ctx.deps
                .renderer
                .send(ctx.user_id, texts::CONFIRM_REQUEST_SUCCESS, None)
                .await?;
            send_main_menu(&ctx.deps, ctx.user_id).await?;
            Ok(Step::Done)
        } else {
            ctx.session.scratch.appointment()?.request_msg_id = Some(request_msg);
            ctx.replace_anchor(texts::PAYMENT_INSTRUCTION, Some(keyboards::payment()))
                .await?;
            Ok(Step::Goto(state::PAYMENT))
        }
    })
}

fn start_payment<'a>(ctx: &'a mut FlowCtx, _event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let form = ctx.session.scratch.appointment()?;
        let doctor_id = form.doctor_id.unwrap_or_default();
        let speciality = form.speciality.clone().unwrap_or_default();
        let description = format!("{} ({})", form.request, speciality);

        let price = match ctx.deps.directory.get_doctor(doctor_id).await? {
            Some(doctor) => doctor.price_for(&speciality).unwrap_or_default(),
            None => 0,
        };
        ctx.session.scratch.appointment()?.price = Some(price);

        let invoice = ctx
            .deps
            .payments
            .send_invoice(
                ctx.user_id,
                "Оплата консультации",
                &description,
                config::payment::APPOINTMENT_PAYLOAD,
                price * 100,
            )
            .await?;
        ctx.session.pending_deletes.push(invoice);
        Ok(Step::Stay)
    })
}

fn process_payment<'a>(ctx: &'a mut FlowCtx, event: &'a Event) -> HandlerFuture<'a> {
    Box::pin(async move {
        let Event::Message { payload: MessagePayload::PaymentConfirmed { charge_id, payload }, .. } = event else {
            return Ok(Step::Stay);
        };
        if payload != config::payment::APPOINTMENT_PAYLOAD {
            return Ok(Step::Stay);
        }

        let form = ctx.session.scratch.appointment()?;
        let price = form.price.unwrap_or_default();
        form.request_text = format!("{}\n\n{}", form.request_text, texts::payment_details(charge_id, price));
        let request_msg_id = form.request_msg_id;
        let booking = build_booking(ctx.user_id, form);
        let request_text = form.request_text.clone();

        if let Some(anchor) = ctx.session.anchor {
            ctx.deps.renderer.edit_markup(ctx.user_id, anchor, None).await?;
        }
        ctx.replace_anchor(texts::SUCCESSFUL_PAYMENT, Some(keyboards::back_to_menu(section::MAIN)))
            .await?;
        if let Some(msg_id) = request_msg_id {
            ctx.deps
                .renderer
                .edit(*config::REQUESTS_CHAT_ID, msg_id, &request_text, None)
                .await?;
        }

        ctx.deps.directory.create_appointment(&booking).await?;
        log::info!("user {} paid for an online consultation ({})", ctx.user_id, charge_id);

        // the link is best effort: its failure is an operations problem,
        // never the client's
        match ctx.deps.links.conference_link().await {
            Ok(url) => {
                let link_line = format!("{}{}", texts::VIDEO_CONF_LINK, url);
                let success = format!("{}\n\n\n{}", texts::SUCCESSFUL_PAYMENT, link_line);
                ctx.edit_anchor(&success, Some(keyboards::back_to_menu(section::MAIN)))
                    .await?;
                if let Some(msg_id) = request_msg_id {
                    let with_link = format!("{request_text}\n\n{link_line}");
                    ctx.deps
                        .renderer
                        .edit(*config::REQUESTS_CHAT_ID, msg_id, &with_link, None)
                        .await?;
                }
            }
            Err(e) => {
                log::error!("conference link generation failed: {}", e);
                let _ = report_link_failure(ctx).await;
            }
        }
        Ok(Step::Done)
    })
}

async fn report_link_failure(ctx: &FlowCtx) -> AppResult<()> {
    ctx.deps
        .renderer
        .send(*config::REQUESTS_CHAT_ID, texts::HTML_LAYOUT_CHANGED, None)
        .await?;
    Ok(())
}
