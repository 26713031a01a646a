use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::SlotId;

/// Half-day period used to narrow suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Morning,
    Afternoon,
}

impl Period {
    pub fn human_es(&self) -> &'static str {
        match self {
            Period::Morning => "mañana",
            Period::Afternoon => "tarde",
        }
    }

    pub fn other(&self) -> Period {
        match self {
            Period::Morning => Period::Afternoon,
            Period::Afternoon => Period::Morning,
        }
    }
}

/// Which day a pending offer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayContext {
    Today,
    Tomorrow,
    Date,
}

/// Disambiguation state while the assistant waits for the user to pick a
/// period, a listed slot number, or an exact hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingContext {
    pub day: DayContext,
    pub period: Option<Period>,
    /// Set when `day == DayContext::Date`.
    pub anchor: Option<NaiveDate>,
}

/// An in-progress, not-yet-confirmed booking. Exists only while a slot has
/// been tentatively accepted and contact data is being collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDraft {
    pub slot: SlotId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl BookingDraft {
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            name: None,
            email: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingPeriodChoice,
    AwaitingContact,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingPeriodChoice => "awaiting_period_choice",
            SessionState::AwaitingContact => "awaiting_contact",
        }
    }
}

/// The JSON payload persisted per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub draft: Option<BookingDraft>,
    pub pending: Option<PendingContext>,
}

/// Per-conversation state, keyed by a caller-supplied session id and evicted
/// after an idle timeout. Draft and PendingContext are mutually exclusive.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub draft: Option<BookingDraft>,
    pub pending: Option<PendingContext>,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn new(id: &str, now: NaiveDateTime, ttl_minutes: i64) -> Self {
        Self {
            id: id.to_string(),
            draft: None,
            pending: None,
            last_activity: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        }
    }

    /// The state is derived: a Draft means we are collecting contact data,
    /// a PendingContext means we are waiting on a period/slot choice.
    pub fn state(&self) -> SessionState {
        if self.draft.is_some() {
            SessionState::AwaitingContact
        } else if self.pending.is_some() {
            SessionState::AwaitingPeriodChoice
        } else {
            SessionState::Idle
        }
    }

    pub fn touch(&mut self, now: NaiveDateTime, ttl_minutes: i64) {
        self.last_activity = now;
        self.expires_at = now + Duration::minutes(ttl_minutes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-11-10 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_state_is_derived_from_fields() {
        let mut s = Session::new("abc", now(), 30);
        assert_eq!(s.state(), SessionState::Idle);

        s.pending = Some(PendingContext {
            day: DayContext::Today,
            period: None,
            anchor: None,
        });
        assert_eq!(s.state(), SessionState::AwaitingPeriodChoice);

        s.pending = None;
        s.draft = Some(BookingDraft::new("2025-11-17T09:00".parse().unwrap()));
        assert_eq!(s.state(), SessionState::AwaitingContact);
    }

    #[test]
    fn test_touch_extends_expiry() {
        let mut s = Session::new("abc", now(), 30);
        let later = now() + Duration::minutes(10);
        s.touch(later, 30);
        assert_eq!(s.expires_at, later + Duration::minutes(30));
    }

    #[test]
    fn test_session_data_roundtrip() {
        let data = SessionData {
            draft: Some(BookingDraft::new("2025-11-17T09:00".parse().unwrap())),
            pending: None,
        };
        let json = serde_json::to_string(&data).unwrap();
        let back: SessionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.draft.unwrap().slot.to_string(), "2025-11-17T09:00");
    }
}
