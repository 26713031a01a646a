pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reservations (
            slot TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            notes TEXT,
            duration_minutes INTEGER NOT NULL DEFAULT 60,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            state TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );",
    )
    .context("failed to create schema")?;

    Ok(conn)
}
