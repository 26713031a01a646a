//! The multi-turn booking dialogue. Rule-based resolution runs first on
//! every turn; the external classifier is only consulted for fresh messages
//! nothing else matched. Session state is loaded and persisted around each
//! turn, so the machine itself is a pure function of (session, message, now).

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::db::queries;
use crate::models::{
    human_datetime, BookingDraft, DayContext, PendingContext, Period, Session, SessionState,
    SlotId, WEEKDAYS_ES,
};
use crate::services::availability::{self, SlotSelector};
use crate::services::booking::{self, BookingError};
use crate::services::{calendar, contact, resolver};
use crate::state::AppState;

const INVALID_HOURS_MSG: &str =
    "Ese horario no es válido. L-V 9-17 y sábados 9-13 (a la hora en punto).";

/// Runs one turn and returns the reply plus the session state it left
/// behind. On error nothing has been persisted, so the caller can invite a
/// retry of the same utterance.
pub async fn process_message(
    state: &Arc<AppState>,
    session_id: &str,
    message: &str,
) -> anyhow::Result<(String, SessionState)> {
    let now = state.clock.now();
    let ttl = state.config.session_ttl_minutes;

    let mut session = {
        let db = state.db.lock().unwrap();
        queries::get_session(&db, session_id, now)?
    }
    .unwrap_or_else(|| Session::new(session_id, now, ttl));

    tracing::debug!(
        session = session_id,
        state = session.state().as_str(),
        "processing message"
    );

    let reply = if resolver::asks_today(message) {
        format!("Hoy es {} (hora local).", human_datetime(now))
    } else if session.draft.is_some() {
        handle_with_draft(state, &mut session, message, now).await?
    } else if session.pending.is_some() {
        handle_follow_up(state, &mut session, message, now).await?
    } else {
        handle_fresh(state, &mut session, message, now).await?
    };

    session.touch(now, ttl);
    {
        let db = state.db.lock().unwrap();
        queries::save_session(&db, &session)?;
        queries::expire_old_sessions(&db, now)?;
    }

    Ok((reply, session.state()))
}

/// A draft exists: we are collecting contact data, but the user may still
/// cancel the tentative slot or move it.
async fn handle_with_draft(
    state: &Arc<AppState>,
    session: &mut Session,
    message: &str,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let draft_date = session.draft.as_ref().map(|d| d.slot.date);
    let explicit = resolver::resolve_explicit(message, now, draft_date);

    if resolver::wants_cancel(message) && explicit.is_none() {
        session.draft = None;
        session.pending = None;
        return Ok(
            "Listo, cancelamos esa hora. ¿Buscamos otra? Di hoy/mañana o una hora concreta."
                .to_string(),
        );
    }

    // "cambiar al lunes 17": date without an hour, restart the period flow.
    if resolver::wants_change(message) {
        if let Some(m) = resolver::match_weekday_day(message) {
            if let Some(date) = resolver::date_for_weekday_day(now, &m) {
                session.draft = None;
                session.pending = Some(PendingContext {
                    day: DayContext::Date,
                    period: None,
                    anchor: Some(date),
                });
                return Ok(format!(
                    "Para el {} {} ¿prefieres por la mañana o por la tarde?",
                    WEEKDAYS_ES[m.weekday as usize], m.day
                ));
            }
        }
    }

    if let Some(slot) = explicit {
        if !calendar::is_business_slot(&slot) {
            return Ok("Esa nueva hora no es válida (L-V 9-17, sáb 9-13).".to_string());
        }
        if !availability::check_available(state.store.as_ref(), &slot).await? {
            return Ok(format!(
                "Para {} ya no hay hueco. ¿Te propongo por la mañana o por la tarde?",
                slot.human()
            ));
        }
        // Keep whatever contact data was already collected.
        if let Some(draft) = session.draft.as_mut() {
            draft.slot = slot;
        }
        return Ok(format!(
            "He cambiado la hora a {}.\nDime tu nombre y correo para confirmar.",
            slot.human()
        ));
    }

    let draft = session.draft.as_mut().unwrap();
    contact::extract_contact(message, draft);
    let slot = draft.slot;
    let notes = draft.notes.clone();

    match (draft.name.clone(), draft.email.clone()) {
        (None, None) => Ok(
            "Necesito tu nombre y correo para confirmar. (Ej: \"Juan Pérez juan@correo.com\"). Si prefieres otra hora, di por ejemplo lunes 17 por la mañana."
                .to_string(),
        ),
        (None, Some(_)) => Ok("¿Tu nombre, por favor? (O nueva hora: lunes 11:00)".to_string()),
        (Some(_), None) => Ok("¿Cuál es tu correo? (O nueva hora: lunes 11am)".to_string()),
        (Some(name), Some(email)) => {
            let result = booking::book_slot(
                state.store.as_ref(),
                state.mailer.as_ref(),
                &slot,
                &name,
                &email,
                notes.as_deref(),
                now,
            )
            .await;

            match result {
                Ok(outcome) => {
                    session.draft = None;
                    let mail_note = if outcome.email_delivered {
                        ""
                    } else {
                        "\n(Nota: el email de confirmación no pudo enviarse ahora.)"
                    };
                    Ok(format!(
                        "✅ Cita confirmada para {}.\nConfirmación a {}.{}",
                        slot.human(),
                        email,
                        mail_note
                    ))
                }
                Err(err @ (BookingError::InvalidHours | BookingError::SlotTaken)) => {
                    session.draft = None;
                    Ok(format!(
                        "No pude guardar la cita ({}). Dime mañana o tarde, o una hora concreta.",
                        err
                    ))
                }
                Err(BookingError::Store(e)) => Err(e),
            }
        }
    }
}

/// Pending context exists: the user is answering a "morning or afternoon?" /
/// "pick a number" prompt.
async fn handle_follow_up(
    state: &Arc<AppState>,
    session: &mut Session,
    message: &str,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let pending = session.pending.clone().unwrap();
    let anchor = anchor_date(&pending, now);

    // A bare number picks from the last offered list. This runs before the
    // hour parser so "1" never reads as 01:00.
    if let Some(n) = resolver::pick_number(message) {
        let selector = SlotSelector {
            day: pending.day,
            period: pending.period,
            count: 5,
            anchor: pending.anchor,
        };
        let slots = availability::suggest_slots(state.store.as_ref(), &selector, now).await?;
        let Some(slot) = slots.get(n - 1).copied() else {
            return Ok(
                "Número fuera de rango. Puedes escribir mañana o tarde, o una hora concreta (p. ej. 10:00)."
                    .to_string(),
            );
        };
        // The list is a snapshot; re-check before committing.
        if !availability::check_available(state.store.as_ref(), &slot).await? {
            return Ok("Ese hueco se tomó recién. ¿Te propongo otras opciones?".to_string());
        }
        session.draft = Some(BookingDraft::new(slot));
        session.pending = None;
        return Ok(format!(
            "Perfecto, apunto {}.\nDime tu nombre y correo para confirmarla.",
            slot.human()
        ));
    }

    if let Some(slot) = resolver::resolve_explicit(message, now, anchor) {
        if !calendar::is_business_slot(&slot) {
            return Ok(INVALID_HOURS_MSG.to_string());
        }
        if !availability::check_available(state.store.as_ref(), &slot).await? {
            return Ok(format!(
                "Para {} no hay disponibilidad. ¿Prefieres mañana o tarde?",
                slot.human()
            ));
        }
        session.draft = Some(BookingDraft::new(slot));
        session.pending = None;
        return Ok(format!(
            "Perfecto, apunto {}.\nDime tu nombre y correo para confirmarla.",
            slot.human()
        ));
    }

    if let Some(period) = resolver::period_choice(message) {
        let selector = SlotSelector {
            day: pending.day,
            period: Some(period),
            count: 3,
            anchor: pending.anchor,
        };
        let slots = availability::suggest_slots(state.store.as_ref(), &selector, now).await?;
        if slots.is_empty() {
            if pending.day == DayContext::Date {
                if let Some(p) = session.pending.as_mut() {
                    p.period = None;
                }
            }
            return Ok(format!(
                "No veo huecos por la {}. ¿Probamos por la {}?",
                period.human_es(),
                period.other().human_es()
            ));
        }
        if let Some(p) = session.pending.as_mut() {
            p.period = Some(period);
        }
        let day_label = match pending.day {
            DayContext::Today => "hoy",
            DayContext::Tomorrow => "mañana",
            DayContext::Date => "ese día",
        };
        return Ok(format!(
            "Para {} por la {} tengo:\n{}\n\nElige 1-{} o escribe una hora exacta.",
            day_label,
            period.human_es(),
            numbered(&slots),
            slots.len()
        ));
    }

    Ok(
        "¿Prefieres mañana o tarde? También puedes indicar una hora, por ejemplo 10:00 o 9am."
            .to_string(),
    )
}

/// No saved state: interpret the message from scratch.
async fn handle_fresh(
    state: &Arc<AppState>,
    session: &mut Session,
    message: &str,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    // "lunes 17 (de noviembre)?": a date without an hour.
    if let Some(m) = resolver::match_weekday_day(message) {
        if let Some(date) = resolver::date_for_weekday_day(now, &m) {
            session.pending = Some(PendingContext {
                day: DayContext::Date,
                period: None,
                anchor: Some(date),
            });
            return Ok(format!(
                "Para el {} {} ¿prefieres por la mañana o por la tarde?",
                WEEKDAYS_ES[m.weekday as usize], m.day
            ));
        }
    }

    // Explicit datetime, with the classifier as last resort.
    let mut slot = resolver::resolve_explicit(message, now, None);
    if slot.is_none() {
        if let Some(classifier) = &state.classifier {
            let now_iso = now.format("%Y-%m-%dT%H:%M").to_string();
            match classifier.classify(message, &now_iso).await {
                Ok(parsed) => {
                    if let Some(iso) = parsed.datetime() {
                        match iso.parse::<SlotId>() {
                            Ok(s) => slot = Some(s),
                            Err(_) => return Ok(INVALID_HOURS_MSG.to_string()),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "classifier call failed, continuing without it");
                }
            }
        }
    }

    if let Some(slot) = slot {
        if !calendar::is_business_slot(&slot) {
            return Ok(INVALID_HOURS_MSG.to_string());
        }
        if !availability::check_available(state.store.as_ref(), &slot).await? {
            // Remember the day so a bare "mañana"/"tarde" answer works.
            if resolver::mentions_today(message) {
                session.pending = Some(PendingContext {
                    day: DayContext::Today,
                    period: None,
                    anchor: None,
                });
            } else if resolver::mentions_tomorrow(message) {
                session.pending = Some(PendingContext {
                    day: DayContext::Tomorrow,
                    period: None,
                    anchor: None,
                });
            }
            return Ok(format!(
                "Para {} no hay disponibilidad. ¿Prefieres mañana o tarde?",
                slot.human()
            ));
        }
        session.draft = Some(BookingDraft::new(slot));
        return Ok(format!(
            "Perfecto, tengo libre {}.\nPor favor, dime tu nombre y correo para confirmarla.\n(Si quieres otra hora, escribe mejor 11am o cambiar a 11:00.)",
            slot.human()
        ));
    }

    // Guided flow: day reference with or without a period phrase. Single
    // words do not count as a period here ("mañana" alone means tomorrow).
    let period = resolver::period_phrase(message);
    if resolver::mentions_tomorrow(message) {
        if let Some(period) = period {
            return offer(state, session, DayContext::Tomorrow, period, None, now).await;
        }
        session.pending = Some(PendingContext {
            day: DayContext::Tomorrow,
            period: None,
            anchor: None,
        });
        return Ok("Para mañana, ¿prefieres por la mañana o por la tarde?".to_string());
    }
    if resolver::mentions_today(message) {
        if let Some(period) = period {
            return offer(state, session, DayContext::Today, period, None, now).await;
        }
        session.pending = Some(PendingContext {
            day: DayContext::Today,
            period: None,
            anchor: None,
        });
        return Ok("Para hoy, ¿prefieres por la mañana o por la tarde?".to_string());
    }

    Ok(
        "Puedo proponerte huecos hoy, mañana o una fecha. Por ejemplo: lunes 17, viernes por la tarde o 14/11 09:00."
            .to_string(),
    )
}

async fn offer(
    state: &Arc<AppState>,
    session: &mut Session,
    day: DayContext,
    period: Period,
    anchor: Option<NaiveDate>,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let selector = SlotSelector {
        day,
        period: Some(period),
        count: 3,
        anchor,
    };
    let slots = availability::suggest_slots(state.store.as_ref(), &selector, now).await?;
    if slots.is_empty() {
        return Ok(
            "No veo huecos en ese periodo. ¿Probamos el otro (mañana/tarde) o una hora concreta?"
                .to_string(),
        );
    }

    session.pending = Some(PendingContext {
        day,
        period: Some(period),
        anchor,
    });
    let day_label = match day {
        DayContext::Today => "para hoy",
        DayContext::Tomorrow => "para mañana",
        DayContext::Date => "para esa fecha",
    };
    Ok(format!(
        "Tengo estos huecos {} por la {}:\n{}\n\nDime el número (1-{}) o escribe la hora exacta.",
        day_label,
        period.human_es(),
        numbered(&slots),
        slots.len()
    ))
}

fn anchor_date(pending: &PendingContext, now: NaiveDateTime) -> Option<NaiveDate> {
    match pending.day {
        DayContext::Today => Some(now.date()),
        DayContext::Tomorrow => now.date().succ_opt(),
        DayContext::Date => pending.anchor,
    }
}

fn numbered(slots: &[SlotId]) -> String {
    slots
        .iter()
        .enumerate()
        .map(|(i, s)| format!("({}) {}", i + 1, s.human()))
        .collect::<Vec<_>>()
        .join("\n")
}
