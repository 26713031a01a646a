use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{DayContext, Period, SlotId};
use crate::services::availability::{
    self, SlotSelector, DEFAULT_HORIZON_DAYS, DEFAULT_SUGGESTION_COUNT,
};
use crate::services::calendar::{self, HoursCheck};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SlotView {
    pub iso: String,
    pub human: String,
}

impl From<SlotId> for SlotView {
    fn from(slot: SlotId) -> Self {
        Self {
            iso: slot.to_string(),
            human: slot.human(),
        }
    }
}

// GET /api/availability/check?iso=2025-11-17T09:00
#[derive(Deserialize)]
pub struct CheckParams {
    pub iso: Option<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckParams>,
) -> Result<Json<CheckResponse>, AppError> {
    let iso = params
        .iso
        .ok_or_else(|| AppError::BadRequest("iso required".to_string()))?;

    // Out-of-hours is a well-formed negative answer, not a request error.
    let hours = calendar::check_iso(&iso);
    if hours != HoursCheck::Ok {
        return Ok(Json(CheckResponse {
            available: false,
            reason: hours.reason(),
        }));
    }

    let slot: SlotId = iso
        .parse()
        .map_err(|_| AppError::BadRequest("invalid iso".to_string()))?;
    let available = availability::check_available(state.store.as_ref(), &slot)
        .await
        .map_err(|e| AppError::Store(e.to_string()))?;

    Ok(Json(CheckResponse {
        available,
        reason: None,
    }))
}

// GET /api/availability/suggest?day=hoy|manana|fecha&period=manana|tarde&count=3&date=2025-11-17
#[derive(Deserialize)]
pub struct SuggestParams {
    pub day: Option<String>,
    pub period: Option<String>,
    pub count: Option<usize>,
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub ok: bool,
    pub slots: Vec<SlotView>,
}

pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestResponse>, AppError> {
    let day = match params.day.as_deref().unwrap_or("hoy") {
        "hoy" => DayContext::Today,
        "manana" => DayContext::Tomorrow,
        "fecha" => DayContext::Date,
        other => {
            return Err(AppError::BadRequest(format!("unknown day: {other}")));
        }
    };
    let period = match params.period.as_deref() {
        None | Some("") => None,
        Some("manana") => Some(Period::Morning),
        Some("tarde") => Some(Period::Afternoon),
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown period: {other}")));
        }
    };
    let anchor = match (day, params.date.as_deref()) {
        (DayContext::Date, Some(date)) => Some(
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| AppError::BadRequest("invalid date".to_string()))?,
        ),
        (DayContext::Date, None) => {
            return Err(AppError::BadRequest("date required for day=fecha".to_string()));
        }
        _ => None,
    };

    let selector = SlotSelector {
        day,
        period,
        count: params.count.unwrap_or(DEFAULT_SUGGESTION_COUNT),
        anchor,
    };
    let now = state.clock.now();
    let slots = availability::suggest_slots(state.store.as_ref(), &selector, now)
        .await
        .map_err(|e| AppError::Store(e.to_string()))?;

    Ok(Json(SuggestResponse {
        ok: true,
        slots: slots.into_iter().map(SlotView::from).collect(),
    }))
}

// GET /api/availability/next?from=2025-11-17T09:00&days=14
#[derive(Deserialize)]
pub struct NextParams {
    pub from: Option<String>,
    pub days: Option<u32>,
}

#[derive(Serialize)]
pub struct NextResponse {
    pub ok: bool,
    pub iso: String,
    pub human: String,
}

pub async fn next(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NextParams>,
) -> Result<Json<NextResponse>, AppError> {
    let from = match params.from.as_deref() {
        Some(iso) => Some(
            iso.parse::<SlotId>()
                .map_err(|_| AppError::BadRequest("invalid from".to_string()))?,
        ),
        None => None,
    };

    let now = state.clock.now();
    let slot = availability::next_available_from(
        state.store.as_ref(),
        from,
        params.days.unwrap_or(DEFAULT_HORIZON_DAYS),
        now,
    )
    .await
    .map_err(|e| AppError::Store(e.to_string()))?
    .ok_or_else(|| AppError::NotFound("no_slot_found".to_string()))?;

    Ok(Json(NextResponse {
        ok: true,
        iso: slot.to_string(),
        human: slot.human(),
    }))
}

// GET /api/availability/summary
#[derive(Serialize)]
pub struct RangeHuman {
    pub start: String,
    pub end: String,
}

#[derive(Serialize)]
pub struct DaySummary {
    pub any: bool,
    #[serde(rename = "rangeHuman", skip_serializing_if = "Option::is_none")]
    pub range_human: Option<RangeHuman>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub ok: bool,
    pub today: DaySummary,
    pub tomorrow: DaySummary,
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummaryResponse>, AppError> {
    let now = state.clock.now();
    let today = availability::summarize_range(state.store.as_ref(), now.date(), now, true)
        .await
        .map_err(|e| AppError::Store(e.to_string()))?;
    let tomorrow_date = now
        .date()
        .succ_opt()
        .ok_or_else(|| AppError::Store("date overflow".to_string()))?;
    let tomorrow = availability::summarize_range(state.store.as_ref(), tomorrow_date, now, false)
        .await
        .map_err(|e| AppError::Store(e.to_string()))?;

    let view = |range: availability::DayRange| DaySummary {
        any: range.any,
        range_human: range.start.zip(range.end).map(|(s, e)| RangeHuman {
            start: s.human(),
            end: e.human(),
        }),
    };

    Ok(Json(SummaryResponse {
        ok: true,
        today: view(today),
        tomorrow: view(tomorrow),
    }))
}
