//! SQLite persistence — WAL mode, one strikes table, insert-or-ignore dedup.
//!
//! The uniqueness invariant lives in the schema, not in application code:
//! a second occurrence of the same `(strike_time_ns, lat, lon)` triple is a
//! defined no-op outcome, never an error. WAL keeps independent readers
//! (other processes, sqlite3 tooling) unblocked while the ingest loop
//! writes.

use rusqlite::{params, Connection, Result as SqlResult};
use serde::Serialize;
use std::path::Path;

use strike_core::StrikeRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS strikes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strike_time_ns INTEGER NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    delay REAL,
    mds INTEGER,
    status INTEGER,
    received_at REAL NOT NULL,
    UNIQUE (strike_time_ns, lat, lon)
);

CREATE INDEX IF NOT EXISTS idx_strikes_received_at ON strikes(received_at);
"#;

/// Result of an insert attempt. Duplicates are a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateIgnored,
}

/// SQLite database for strike records.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open(path: &str) -> SqlResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = Path::new(path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Store { conn })
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> SqlResult<Self> {
        Self::open(":memory:")
    }

    /// Insert a record, ignoring duplicates of the identity triple.
    ///
    /// Errors only on storage-layer faults; a duplicate key reports
    /// `DuplicateIgnored` via the affected-row count.
    pub fn insert(&mut self, record: &StrikeRecord) -> SqlResult<InsertOutcome> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO strikes
             (strike_time_ns, lat, lon, delay, mds, status, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.time_ns,
                record.lat,
                record.lon,
                record.delay,
                record.mds,
                record.status,
                record.received_at,
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::DuplicateIgnored)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    pub fn count_strikes(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM strikes", [], |r| r.get(0))
            .unwrap_or(0)
    }

    /// Wall-clock time of the most recently inserted row, if any.
    pub fn last_received_at(&self) -> Option<f64> {
        self.conn
            .query_row("SELECT MAX(received_at) FROM strikes", [], |r| r.get(0))
            .ok()
            .flatten()
    }

    pub fn stats(&self) -> DbStats {
        DbStats {
            strikes: self.count_strikes(),
            last_received_at: self.last_received_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DbStats {
    pub strikes: i64,
    pub last_received_at: Option<f64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
