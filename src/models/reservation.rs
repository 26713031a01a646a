use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const SLOT_MINUTES: i64 = 60;

/// Payload stored under a slot id in the reservation store. The store key
/// itself carries the booking semantics: key exists = slot taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub name: String,
    pub email: String,
    pub notes: Option<String>,
    pub duration_minutes: i64,
    pub created_at: NaiveDateTime,
}

impl ReservationRecord {
    pub fn new(name: &str, email: &str, notes: Option<&str>, now: NaiveDateTime) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            notes: notes.map(str::to_string),
            duration_minutes: SLOT_MINUTES,
            created_at: now,
        }
    }
}
