use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::models::SlotId;

pub const OPEN_HOUR: u32 = 9;
pub const CLOSE_HOUR_WEEKDAY: u32 = 17;
pub const CLOSE_HOUR_SATURDAY: u32 = 13;

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2})$").unwrap());

/// Weekday for a proleptic Gregorian date via Zeller's congruence,
/// mapped to 0=domingo..6=sábado.
pub fn weekday(year: i32, month: u32, day: u32) -> u32 {
    let (mut y, mut m) = (year as i64, month as i64);
    if m < 3 {
        m += 12;
        y -= 1;
    }
    let d = day as i64;
    let k = y.rem_euclid(100);
    let j = y.div_euclid(100);
    let h = (d + (13 * (m + 1)) / 5 + k + k / 4 + j / 4 + 5 * j).rem_euclid(7);
    ((h + 6) % 7) as u32
}

pub fn weekday_of(date: NaiveDate) -> u32 {
    weekday(date.year(), date.month(), date.day())
}

/// Half-open opening interval `[open, close)` for a weekday index, or `None`
/// when closed. This is the single source of truth for openness.
pub fn business_hours(weekday: u32) -> Option<(u32, u32)> {
    match weekday {
        1..=5 => Some((OPEN_HOUR, CLOSE_HOUR_WEEKDAY)),
        6 => Some((OPEN_HOUR, CLOSE_HOUR_SATURDAY)),
        _ => None,
    }
}

pub fn is_business_slot(slot: &SlotId) -> bool {
    business_hours(slot.weekday())
        .is_some_and(|(open, close)| slot.hour >= open && slot.hour < close)
}

/// All bookable slots of a date, ascending by hour. Empty when closed.
pub fn enumerate_slots(date: NaiveDate) -> Vec<SlotId> {
    match business_hours(weekday_of(date)) {
        Some((open, close)) => (open..close).map(|h| SlotId::new(date, h)).collect(),
        None => Vec::new(),
    }
}

/// Outcome of validating a raw canonical-format string against the
/// business-hours policy, with the reason exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoursCheck {
    Ok,
    BadFormat,
    NotAligned,
    SundayClosed,
    OutsideHours,
}

impl HoursCheck {
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            HoursCheck::Ok => None,
            HoursCheck::BadFormat => Some("bad_format"),
            HoursCheck::NotAligned => Some("not_aligned"),
            HoursCheck::SundayClosed => Some("sunday_closed"),
            HoursCheck::OutsideHours => Some("outside_hours"),
        }
    }
}

/// Validates a raw `YYYY-MM-DDTHH:mm` string. Slots are 60 minutes, so any
/// nonzero minute is rejected as misaligned.
pub fn check_iso(iso: &str) -> HoursCheck {
    let Some(caps) = ISO_RE.captures(iso) else {
        return HoursCheck::BadFormat;
    };
    let num = |i: usize| caps[i].parse::<u32>().ok();
    let (Some(month), Some(day), Some(hour), Some(minute)) = (num(2), num(3), num(4), num(5))
    else {
        return HoursCheck::BadFormat;
    };
    let Ok(year) = caps[1].parse::<i32>() else {
        return HoursCheck::BadFormat;
    };
    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return HoursCheck::BadFormat;
    }
    if minute != 0 {
        return HoursCheck::NotAligned;
    }
    match business_hours(weekday(year, month, day)) {
        None => HoursCheck::SundayClosed,
        Some((open, close)) if hour >= open && hour < close => HoursCheck::Ok,
        Some(_) => HoursCheck::OutsideHours,
    }
}
