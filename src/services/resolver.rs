//! Turns Spanish free-text fragments ("lunes 17", "9am", "14/11 09:00") into
//! candidate slots. Resolution is local and table-driven; when nothing
//! matches the caller may fall back to the external intent classifier.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

use crate::models::{Period, SlotId};
use crate::services::calendar;

// "lunes 17", "sábado 9 de noviembre"
static WEEKDAY_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(lunes|martes|mi[eé]rcoles|jueves|viernes|s[áa]bado|domingo)\s+(\d{1,2})(?:\s+de\s+(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre))?\b",
    )
    .unwrap()
});

// "14/11 09:00", "14-11-2025 9"
static EXPLICIT_DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/\-](\d{1,2})(?:[/\-](\d{2,4}))?\s+(\d{1,2})(?::(\d{2}))?\b").unwrap()
});

// "9", "9am", "10:00"
static BARE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").unwrap());

static PERIOD_MORNING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(por la ma[nñ]ana|de la ma[nñ]ana)\b").unwrap());
static PERIOD_AFTERNOON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(por la tarde|de la tarde)\b").unwrap());

// Single-word period choices, meaningful only as a follow-up answer.
static CHOICE_MORNING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(ma[nñ]ana|mañanita|temprano|tempranito)\b").unwrap());
static CHOICE_AFTERNOON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(tarde|tardecita|tardecito)\b").unwrap());

static ASK_TODAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(que|qué)?\s*(fecha|d[ií]a)\s*(es)?\s*hoy\b|en\s+qu[eé]\s+d[ií]a\s+estamos")
        .unwrap()
});

static CANCEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(cancelar|mejor\s+no|olv[ií]dalo|dejarlo)\b").unwrap());
static CHANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(cambiar|modificar|mejor|otra\s+hora|prefiero|cambiarla)\b").unwrap()
});

static TODAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bhoy\b").unwrap());
static TOMORROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bma[nñ]ana\b").unwrap());

static PICK_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?\s*(\d{1,2})\s*\)?$").unwrap());

fn strip_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            _ => c,
        })
        .collect()
}

fn weekday_index(name: &str) -> Option<u32> {
    match strip_diacritics(&name.to_lowercase()).as_str() {
        "domingo" => Some(0),
        "lunes" => Some(1),
        "martes" => Some(2),
        "miercoles" => Some(3),
        "jueves" => Some(4),
        "viernes" => Some(5),
        "sabado" => Some(6),
        _ => None,
    }
}

fn month_index(name: &str) -> Option<u32> {
    match strip_diacritics(&name.to_lowercase()).as_str() {
        "enero" => Some(1),
        "febrero" => Some(2),
        "marzo" => Some(3),
        "abril" => Some(4),
        "mayo" => Some(5),
        "junio" => Some(6),
        "julio" => Some(7),
        "agosto" => Some(8),
        "septiembre" | "setiembre" => Some(9),
        "octubre" => Some(10),
        "noviembre" => Some(11),
        "diciembre" => Some(12),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeekdayDayMatch {
    pub weekday: u32,
    pub day: u32,
    pub month: Option<u32>,
}

/// Detects the "weekday + day-of-month [+ month name]" pattern. Returns a
/// date-only request; the hour is resolved separately by the period flow.
pub fn match_weekday_day(text: &str) -> Option<WeekdayDayMatch> {
    let caps = WEEKDAY_DAY_RE.captures(text)?;
    let weekday = weekday_index(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }
    let month = caps.get(3).and_then(|m| month_index(m.as_str()));
    Some(WeekdayDayMatch { weekday, day, month })
}

/// Finds the nearest future date whose weekday and day-of-month match.
/// With a fixed month the search advances in yearly steps (capped at 6);
/// without one it walks month by month (capped at 12), skipping past dates.
/// Falls back to the literal date when the cap is exhausted.
pub fn date_for_weekday_day(now: NaiveDateTime, m: &WeekdayDayMatch) -> Option<NaiveDate> {
    let today = now.date();

    if let Some(month) = m.month {
        let mut year = today.year();
        if month < today.month() || (month == today.month() && m.day < today.day()) {
            year += 1;
        }
        let literal = NaiveDate::from_ymd_opt(year, month, m.day)?;
        if calendar::weekday_of(literal) == m.weekday {
            return Some(literal);
        }
        for i in 1..=6 {
            if let Some(d) = NaiveDate::from_ymd_opt(year + i, month, m.day) {
                if calendar::weekday_of(d) == m.weekday {
                    return Some(d);
                }
            }
        }
        return Some(literal);
    }

    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..12 {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, m.day) {
            if calendar::weekday_of(d) == m.weekday && d >= today {
                return Some(d);
            }
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    NaiveDate::from_ymd_opt(today.year(), today.month(), m.day)
}

/// "por la tarde" shifts a literal 1..11 hour to the afternoon;
/// "por la mañana" maps a literal 12 back to midnight.
fn adjust_for_period(lower: &str, hour: u32) -> u32 {
    let mut hour = hour;
    if PERIOD_AFTERNOON_RE.is_match(lower) && (1..=11).contains(&hour) {
        hour += 12;
    }
    if PERIOD_MORNING_RE.is_match(lower) && hour == 12 {
        hour = 0;
    }
    hour
}

/// Resolves an utterance that carries an explicit time to a slot.
///
/// Order: `dd/mm[/yy] hh[:mm]` first, then a bare hour with optional am/pm.
/// A bare hour uses the anchor date when one is supplied; otherwise it means
/// today, rolling to tomorrow when the hour is not strictly in the future.
/// Returns `None` when no pattern matches; that is not an error.
pub fn resolve_explicit(text: &str, now: NaiveDateTime, anchor: Option<NaiveDate>) -> Option<SlotId> {
    let lower = text.to_lowercase();

    if let Some(caps) = EXPLICIT_DATE_TIME_RE.captures(&lower) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = match caps.get(3) {
            Some(y) if y.as_str().len() == 2 => 2000 + y.as_str().parse::<i32>().ok()?,
            Some(y) => y.as_str().parse().ok()?,
            None => now.date().year(),
        };
        let hour = adjust_for_period(&lower, caps[4].parse().ok()?);
        if hour > 23 {
            return None;
        }
        return SlotId::from_ymd_hour(year, month, day, hour);
    }

    if let Some(caps) = BARE_TIME_RE.captures(&lower) {
        let mut hour = adjust_for_period(&lower, caps[1].parse().ok()?);
        if let Some(ampm) = caps.get(3) {
            let pm = ampm.as_str().eq_ignore_ascii_case("pm");
            hour = (hour % 12) + if pm { 12 } else { 0 };
        }
        if hour > 23 {
            return None;
        }
        let date = match anchor {
            Some(d) => d,
            None if hour <= now.hour() => now.date().succ_opt()?,
            None => now.date(),
        };
        return Some(SlotId::new(date, hour));
    }

    None
}

pub fn asks_today(text: &str) -> bool {
    ASK_TODAY_RE.is_match(text)
}

pub fn wants_cancel(text: &str) -> bool {
    CANCEL_RE.is_match(text)
}

pub fn wants_change(text: &str) -> bool {
    CHANGE_RE.is_match(text)
}

pub fn mentions_today(text: &str) -> bool {
    TODAY_RE.is_match(text)
}

/// "mañana" as a day reference. Period phrases are stripped first so that
/// "hoy por la mañana" does not read as tomorrow.
pub fn mentions_tomorrow(text: &str) -> bool {
    let stripped = PERIOD_MORNING_RE.replace_all(text, " ");
    TOMORROW_RE.is_match(&stripped)
}

/// Full period phrases only ("por la mañana", "de la tarde"), the form a
/// fresh request uses.
pub fn period_phrase(text: &str) -> Option<Period> {
    if PERIOD_MORNING_RE.is_match(text) {
        Some(Period::Morning)
    } else if PERIOD_AFTERNOON_RE.is_match(text) {
        Some(Period::Afternoon)
    } else {
        None
    }
}

/// Period detection for follow-up answers, where single words ("mañana",
/// "tarde", "temprano") are unambiguous.
pub fn period_choice(text: &str) -> Option<Period> {
    if PERIOD_MORNING_RE.is_match(text) || CHOICE_MORNING_RE.is_match(text) {
        Some(Period::Morning)
    } else if PERIOD_AFTERNOON_RE.is_match(text) || CHOICE_AFTERNOON_RE.is_match(text) {
        Some(Period::Afternoon)
    } else {
        None
    }
}

/// A whole utterance that is just a 1-2 digit number, optionally wrapped in
/// parentheses: a pick from the last offered list.
pub fn pick_number(text: &str) -> Option<usize> {
    let caps = PICK_NUMBER_RE.captures(text.trim())?;
    let n: usize = caps[1].parse().ok()?;
    if n == 0 {
        None
    } else {
        Some(n)
    }
}
