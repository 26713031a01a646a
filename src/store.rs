use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{ReservationRecord, SlotId};

/// The reservation store: a document per slot id, existence means booked.
/// `create_if_absent` is the single conditional write in the system and must
/// be atomic: at most one booking per slot, even under concurrent turns.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn exists(&self, slot: &SlotId) -> anyhow::Result<bool>;

    /// Returns `true` when the record was created, `false` on conflict.
    async fn create_if_absent(
        &self,
        slot: &SlotId,
        record: &ReservationRecord,
    ) -> anyhow::Result<bool>;
}

pub struct SqliteReservationStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteReservationStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    async fn exists(&self, slot: &SlotId) -> anyhow::Result<bool> {
        let db = self.db.lock().unwrap();
        queries::reservation_exists(&db, slot)
    }

    async fn create_if_absent(
        &self,
        slot: &SlotId,
        record: &ReservationRecord,
    ) -> anyhow::Result<bool> {
        let db = self.db.lock().unwrap();
        queries::insert_reservation_if_absent(&db, slot, record)
    }
}
