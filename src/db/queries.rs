use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::models::{ReservationRecord, Session, SessionData, SlotId};

const DT_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Sessions ──

pub fn get_session(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Option<Session>> {
    let now_str = now.format(DT_FMT).to_string();
    let mut stmt = conn.prepare(
        "SELECT id, data, last_activity, expires_at FROM sessions
         WHERE id = ?1 AND expires_at > ?2",
    )?;

    let result = stmt.query_row(params![id, now_str], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    });

    match result {
        Ok((id, data_json, last_activity_str, expires_at_str)) => {
            let data: SessionData = serde_json::from_str(&data_json).unwrap_or_default();
            let last_activity =
                NaiveDateTime::parse_from_str(&last_activity_str, DT_FMT).unwrap_or(now);
            let expires_at = NaiveDateTime::parse_from_str(&expires_at_str, DT_FMT).unwrap_or(now);

            Ok(Some(Session {
                id,
                draft: data.draft,
                pending: data.pending,
                last_activity,
                expires_at,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_session(conn: &Connection, session: &Session) -> anyhow::Result<()> {
    let data = SessionData {
        draft: session.draft.clone(),
        pending: session.pending.clone(),
    };
    let data_json = serde_json::to_string(&data)?;
    let last_activity = session.last_activity.format(DT_FMT).to_string();
    let expires_at = session.expires_at.format(DT_FMT).to_string();

    conn.execute(
        "INSERT INTO sessions (id, data, state, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           data = excluded.data,
           state = excluded.state,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![
            session.id,
            data_json,
            session.state().as_str(),
            last_activity,
            expires_at
        ],
    )?;
    Ok(())
}

pub fn expire_old_sessions(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
    let now_str = now.format(DT_FMT).to_string();
    let count = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now_str])?;
    Ok(count)
}

// ── Reservations ──

pub fn reservation_exists(conn: &Connection, slot: &SlotId) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM reservations WHERE slot = ?1",
        params![slot.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Conditional create: the PRIMARY KEY plus `ON CONFLICT DO NOTHING` makes
/// this atomic; the affected-row count is the created flag.
pub fn insert_reservation_if_absent(
    conn: &Connection,
    slot: &SlotId,
    record: &ReservationRecord,
) -> anyhow::Result<bool> {
    let created_at = record.created_at.format(DT_FMT).to_string();
    let changed = conn.execute(
        "INSERT INTO reservations (slot, name, email, notes, duration_minutes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(slot) DO NOTHING",
        params![
            slot.to_string(),
            record.name,
            record.email,
            record.notes,
            record.duration_minutes,
            created_at
        ],
    )?;
    Ok(changed > 0)
}
