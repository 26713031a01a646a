//! Free-slot queries against the reservation store. All enumeration is a
//! pure, order-stable function of the selector and the store's state, so a
//! later "pick slot #N" re-derives the same list.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::models::{DayContext, Period, SlotId};
use crate::services::calendar;
use crate::store::ReservationStore;

pub const DEFAULT_SUGGESTION_COUNT: usize = 3;
pub const MAX_SUGGESTION_COUNT: usize = 10;
pub const DEFAULT_HORIZON_DAYS: u32 = 14;
pub const MAX_HORIZON_DAYS: u32 = 60;

#[derive(Debug, Clone)]
pub struct SlotSelector {
    pub day: DayContext,
    pub period: Option<Period>,
    pub count: usize,
    /// Target date when `day == DayContext::Date`.
    pub anchor: Option<NaiveDate>,
}

impl SlotSelector {
    fn target_date(&self, now: NaiveDateTime) -> Option<NaiveDate> {
        match self.day {
            DayContext::Today => Some(now.date()),
            DayContext::Tomorrow => now.date().succ_opt(),
            DayContext::Date => self.anchor,
        }
    }
}

/// Advisory read: the slot may still be taken by a concurrent booking
/// before this conversation's create executes.
pub async fn check_available(store: &dyn ReservationStore, slot: &SlotId) -> anyhow::Result<bool> {
    if !calendar::is_business_slot(slot) {
        return Ok(false);
    }
    Ok(!store.exists(slot).await?)
}

/// Up to `count` free slots for the selector, ascending by hour. For today,
/// hours that have already started are never offered.
pub async fn suggest_slots(
    store: &dyn ReservationStore,
    selector: &SlotSelector,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<SlotId>> {
    let Some(date) = selector.target_date(now) else {
        return Ok(Vec::new());
    };
    let count = selector.count.clamp(1, MAX_SUGGESTION_COUNT);

    let mut slots = Vec::new();
    for slot in calendar::enumerate_slots(date) {
        match selector.period {
            Some(Period::Morning) if slot.hour >= 12 => continue,
            Some(Period::Afternoon) if slot.hour < 12 => continue,
            _ => {}
        }
        if selector.day == DayContext::Today && date == now.date() {
            if slot.hour < now.hour() {
                continue;
            }
            if slot.hour == now.hour() && now.minute() > 0 {
                continue;
            }
        }
        if store.exists(&slot).await? {
            continue;
        }
        slots.push(slot);
        if slots.len() >= count {
            break;
        }
    }
    Ok(slots)
}

/// Walks forward hour by hour from the anchor (or the next whole hour from
/// now) for up to `horizon_days`, returning the first free business slot.
pub async fn next_available_from(
    store: &dyn ReservationStore,
    from: Option<SlotId>,
    horizon_days: u32,
    now: NaiveDateTime,
) -> anyhow::Result<Option<SlotId>> {
    let days = horizon_days.clamp(1, MAX_HORIZON_DAYS);
    let start = match from {
        Some(slot) => slot
            .date
            .and_hms_opt(slot.hour, 0, 0)
            .unwrap_or_else(|| next_whole_hour(now)),
        None => next_whole_hour(now),
    };

    for i in 0..(days as i64 * 24) {
        let t = start + Duration::hours(i);
        let slot = SlotId::new(t.date(), t.hour());
        if !calendar::is_business_slot(&slot) {
            continue;
        }
        if t.date() == now.date() {
            if slot.hour < now.hour() {
                continue;
            }
            if slot.hour == now.hour() && now.minute() > 0 {
                continue;
            }
        }
        if !store.exists(&slot).await? {
            return Ok(Some(slot));
        }
    }
    Ok(None)
}

fn next_whole_hour(now: NaiveDateTime) -> NaiveDateTime {
    let truncated = now
        .date()
        .and_hms_opt(now.hour(), 0, 0)
        .unwrap_or(now);
    if now.minute() == 0 {
        truncated
    } else {
        truncated + Duration::hours(1)
    }
}

/// First and last free slot of a date, for the at-a-glance greeting.
#[derive(Debug, Clone)]
pub struct DayRange {
    pub any: bool,
    pub start: Option<SlotId>,
    pub end: Option<SlotId>,
}

pub async fn summarize_range(
    store: &dyn ReservationStore,
    date: NaiveDate,
    now: NaiveDateTime,
    only_future: bool,
) -> anyhow::Result<DayRange> {
    let mut first = None;
    let mut last = None;
    for slot in calendar::enumerate_slots(date) {
        if only_future && date == now.date() {
            if slot.hour < now.hour() {
                continue;
            }
            if slot.hour == now.hour() && now.minute() > 0 {
                continue;
            }
        }
        if store.exists(&slot).await? {
            continue;
        }
        if first.is_none() {
            first = Some(slot);
        }
        last = Some(slot);
    }
    Ok(DayRange {
        any: first.is_some(),
        start: first,
        end: last,
    })
}
