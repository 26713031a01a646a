use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::SlotId;
use crate::services::booking::{self, BookingError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BookRequest {
    pub iso: String,
    pub name: String,
    pub email: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct BookResponse {
    pub ok: bool,
    pub iso: String,
    pub human: String,
    #[serde(rename = "emailOk")]
    pub email_ok: bool,
}

pub async fn book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookRequest>,
) -> Result<Json<BookResponse>, AppError> {
    let slot: SlotId = req
        .iso
        .parse()
        .map_err(|_| AppError::BadRequest("invalid iso".to_string()))?;
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest("name and email required".to_string()));
    }

    let outcome = booking::book_slot(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &slot,
        name,
        email,
        req.notes.as_deref(),
        state.clock.now(),
    )
    .await
    .map_err(|e| match e {
        BookingError::InvalidHours => AppError::BadRequest("outside_business_hours".to_string()),
        BookingError::SlotTaken => AppError::Conflict("slot_taken".to_string()),
        BookingError::Store(e) => AppError::Store(e.to_string()),
    })?;

    Ok(Json(BookResponse {
        ok: true,
        iso: outcome.slot.to_string(),
        human: outcome.slot.human(),
        email_ok: outcome.email_delivered,
    }))
}
