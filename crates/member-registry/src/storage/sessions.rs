//! Persisted visitor sessions.
//!
//! Each row holds one serialized session record and its expiry as a unix
//! timestamp. Expired rows are never loaded and are removed by
//! [`Storage::prune_expired_sessions`].

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::Storage;
use crate::error::Result;

impl Storage {
    /// Insert a new session row.
    ///
    /// Returns `false` without touching anything if the id is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn insert_session(&self, id: &str, data: &str, expires_at: i64) -> Result<bool> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO sessions (id, data, expires_at) VALUES (?1, ?2, ?3)",
            params![id, data, expires_at],
        )?;
        Ok(affected == 1)
    }

    /// Insert or overwrite a session row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_session(&self, id: &str, data: &str, expires_at: i64) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO sessions (id, data, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET data = excluded.data, expires_at = excluded.expires_at
            ",
            params![id, data, expires_at],
        )?;
        Ok(())
    }

    /// Load a session that is still live at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn load_session(&self, id: &str, now: i64) -> Result<Option<String>> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM sessions WHERE id = ?1 AND expires_at > ?2",
                params![id, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    /// Remove one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Remove every session that expired at or before `now`.
    ///
    /// Returns the number of sessions deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn prune_expired_sessions(&self, now: i64) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;

        if affected > 0 {
            info!("Pruned {} expired sessions", affected);
        } else {
            debug!("No expired sessions to prune");
        }
        Ok(affected)
    }

    /// Count stored sessions, live or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn session_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }
}
