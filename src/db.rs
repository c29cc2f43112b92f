//! Database module for the monument concierge
//!
//! Provides persistence for chat sessions and short-lived passcodes.

mod schema;

pub use schema::*;

use crate::state_machine::Session;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Cheap liveness check for the health endpoint
    pub fn ping(&self) -> bool {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    // ==================== Session Operations ====================

    /// Load a session by ID.
    ///
    /// A row that no longer deserializes is treated as absent so the caller
    /// starts a fresh session instead of failing every turn.
    pub fn load_session(&self, id: &str) -> DbResult<Option<Session>> {
        Ok(self.session_record(id)?.map(|record| record.session))
    }

    /// Load a session together with its timestamps
    pub fn session_record(&self, id: &str) -> DbResult<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT data, created_at, updated_at FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((data, created_at, updated_at)) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&data) {
            Ok(mut session) => {
                // The row key is authoritative
                session.id = id.to_string();
                Ok(Some(SessionRecord {
                    session,
                    created_at: parse_datetime(&created_at),
                    updated_at: parse_datetime(&updated_at),
                }))
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Discarding unreadable session");
                Ok(None)
            }
        }
    }

    /// Insert or replace a session
    pub fn save_session(&self, session: &Session, now: DateTime<Utc>) -> DbResult<()> {
        let data = serde_json::to_string(session)?;
        let now = format_datetime(now);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, data, stage, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                stage = excluded.stage,
                updated_at = excluded.updated_at",
            params![session.id, data, session.stage.as_str(), now],
        )?;
        Ok(())
    }

    #[allow(dead_code)] // Used in tests
    pub fn delete_session(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Overwrite the stored payload of a session without parsing it
    #[cfg(test)]
    pub fn put_raw_session(&self, id: &str, data: &str) -> DbResult<()> {
        let now = format_datetime(Utc::now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO sessions (id, data, stage, created_at, updated_at)
             VALUES (?1, ?2, 'idle', ?3, ?3)",
            params![id, data, now],
        )?;
        Ok(())
    }

    // ==================== Passcode Operations ====================

    /// Store a code for `email`, replacing any previous one
    pub fn put_passcode(&self, email: &str, code: &str, expires_at: DateTime<Utc>) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO passcodes (email, code, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET code = excluded.code, expires_at = excluded.expires_at",
            params![email, code, format_datetime(expires_at)],
        )?;
        Ok(())
    }

    /// Code stored for `email` that has not expired at `now`
    pub fn get_passcode(&self, email: &str, now: DateTime<Utc>) -> DbResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let code = conn
            .query_row(
                "SELECT code FROM passcodes WHERE email = ?1 AND expires_at > ?2",
                params![email, format_datetime(now)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(code)
    }

    pub fn delete_passcode(&self, email: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM passcodes WHERE email = ?1", params![email])?;
        Ok(())
    }

    /// Drop expired passcodes and sessions idle since before `session_cutoff`
    pub fn purge_expired(
        &self,
        now: DateTime<Utc>,
        session_cutoff: DateTime<Utc>,
    ) -> DbResult<PurgeStats> {
        let conn = self.conn.lock().unwrap();
        let passcodes = conn.execute(
            "DELETE FROM passcodes WHERE expires_at <= ?1",
            params![format_datetime(now)],
        )?;
        let sessions = conn.execute(
            "DELETE FROM sessions WHERE updated_at < ?1",
            params![format_datetime(session_cutoff)],
        )?;
        Ok(PurgeStats {
            passcodes,
            sessions,
        })
    }
}

/// Fixed-width UTC timestamps so text comparison in SQL matches time order
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
