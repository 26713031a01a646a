use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::services::calendar;

pub const WEEKDAYS_ES: [&str; 7] = [
    "domingo",
    "lunes",
    "martes",
    "miércoles",
    "jueves",
    "viernes",
    "sábado",
];

pub const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

static SLOT_ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2})$").unwrap());

/// One bookable 60-minute unit: a calendar date plus a whole hour.
/// Canonical wire form is `YYYY-MM-DDTHH:00` in the operating time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId {
    pub date: NaiveDate,
    pub hour: u32,
}

impl SlotId {
    pub fn new(date: NaiveDate, hour: u32) -> Self {
        Self { date, hour }
    }

    pub fn from_ymd_hour(year: i32, month: u32, day: u32, hour: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Self { date, hour })
    }

    /// Weekday index 0=domingo..6=sábado, via the calendar engine.
    pub fn weekday(&self) -> u32 {
        calendar::weekday(self.date.year(), self.date.month(), self.date.day())
    }

    /// Human rendering: "lunes, 17 de noviembre de 2025, 09:00".
    pub fn human(&self) -> String {
        format!(
            "{}, {} de {} de {}, {:02}:00",
            WEEKDAYS_ES[self.weekday() as usize],
            self.date.day(),
            MONTHS_ES[(self.date.month() - 1) as usize],
            self.date.year(),
            self.hour
        )
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:00",
            self.date.year(),
            self.date.month(),
            self.date.day(),
            self.hour
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid slot id: {0}")]
pub struct ParseSlotError(String);

impl FromStr for SlotId {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SLOT_ISO_RE
            .captures(s)
            .ok_or_else(|| ParseSlotError(s.to_string()))?;
        let num =
            |i: usize| caps[i].parse::<u32>().map_err(|_| ParseSlotError(s.to_string()));
        let year: i32 = caps[1].parse().map_err(|_| ParseSlotError(s.to_string()))?;
        let (month, day, hour, minute) = (num(2)?, num(3)?, num(4)?, num(5)?);
        if minute != 0 || hour > 23 {
            return Err(ParseSlotError(s.to_string()));
        }
        SlotId::from_ymd_hour(year, month, day, hour).ok_or_else(|| ParseSlotError(s.to_string()))
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Human rendering of an arbitrary local datetime, same shape as
/// [`SlotId::human`] but keeping the real minutes.
pub fn human_datetime(dt: NaiveDateTime) -> String {
    let w = calendar::weekday(dt.year(), dt.month(), dt.day());
    format!(
        "{}, {} de {} de {}, {:02}:{:02}",
        WEEKDAYS_ES[w as usize],
        dt.day(),
        MONTHS_ES[(dt.month() - 1) as usize],
        dt.year(),
        dt.hour(),
        dt.minute()
    )
}
