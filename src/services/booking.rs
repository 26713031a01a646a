//! Booking finalization: validate business hours, write the reservation
//! atomically, then fire the confirmation email best-effort.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{ReservationRecord, SlotId};
use crate::services::calendar;
use crate::services::mailer::NotificationSender;
use crate::store::ReservationStore;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Ese horario no es válido. Atendemos de lunes a viernes de 9:00 a 17:00 y sábados de 9:00 a 13:00, a la hora en punto.")]
    InvalidHours,
    #[error("Esa hora acaba de ser reservada por otra persona.")]
    SlotTaken,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub slot: SlotId,
    pub email_delivered: bool,
}

/// Creates the reservation. The store's conditional create is the only
/// arbiter of the race: two concurrent bookings of the same slot resolve to
/// exactly one `Ok` and one `SlotTaken`.
pub async fn book_slot(
    store: &dyn ReservationStore,
    mailer: &dyn NotificationSender,
    slot: &SlotId,
    name: &str,
    email: &str,
    notes: Option<&str>,
    now: NaiveDateTime,
) -> Result<BookingOutcome, BookingError> {
    if !calendar::is_business_slot(slot) {
        return Err(BookingError::InvalidHours);
    }

    let record = ReservationRecord::new(name, email, notes, now);
    let created = store.create_if_absent(slot, &record).await?;
    if !created {
        return Err(BookingError::SlotTaken);
    }
    tracing::info!(slot = %slot, "reservation created");

    // The slot is already ours; a mail failure must not undo that.
    let email_delivered = match mailer.send_confirmation(email, name, slot).await {
        Ok(outcome) => outcome.delivered,
        Err(e) => {
            tracing::warn!(slot = %slot, error = %e, "confirmation email failed");
            false
        }
    };

    Ok(BookingOutcome {
        slot: *slot,
        email_delivered,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::services::mailer::{DisabledSender, SendOutcome};

    struct MemStore {
        taken: Mutex<HashSet<String>>,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                taken: Mutex::new(HashSet::new()),
            }
        }
    }

    #[async_trait]
    impl ReservationStore for MemStore {
        async fn exists(&self, slot: &SlotId) -> anyhow::Result<bool> {
            Ok(self.taken.lock().unwrap().contains(&slot.to_string()))
        }

        async fn create_if_absent(
            &self,
            slot: &SlotId,
            _record: &ReservationRecord,
        ) -> anyhow::Result<bool> {
            Ok(self.taken.lock().unwrap().insert(slot.to_string()))
        }
    }

    struct FailingSender;

    #[async_trait]
    impl NotificationSender for FailingSender {
        async fn send_confirmation(
            &self,
            _to: &str,
            _name: &str,
            _slot: &SlotId,
        ) -> anyhow::Result<SendOutcome> {
            anyhow::bail!("provider down")
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-11-10 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[tokio::test]
    async fn test_book_rejects_sunday() {
        let store = MemStore::new();
        let slot: SlotId = "2025-11-16T10:00".parse().unwrap();
        let err = book_slot(&store, &DisabledSender, &slot, "Ana", "a@b.es", None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidHours));
    }

    #[tokio::test]
    async fn test_double_book_reports_conflict() {
        let store = MemStore::new();
        let slot: SlotId = "2025-11-17T09:00".parse().unwrap();

        book_slot(&store, &DisabledSender, &slot, "Ana", "a@b.es", None, now())
            .await
            .unwrap();
        let err = book_slot(&store, &DisabledSender, &slot, "Luis", "l@b.es", None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotTaken));
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_undo_booking() {
        let store = MemStore::new();
        let slot: SlotId = "2025-11-17T09:00".parse().unwrap();

        let outcome = book_slot(&store, &FailingSender, &slot, "Ana", "a@b.es", None, now())
            .await
            .unwrap();
        assert!(!outcome.email_delivered);
        assert!(store.exists(&slot).await.unwrap());
    }
}
