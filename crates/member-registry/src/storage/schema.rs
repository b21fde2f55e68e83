//! `SQLite` schema definitions for the member registry.
//!
//! This module contains the SQL statements for creating the database
//! schema and the idempotent [`ensure_schema`] entry point.

use rusqlite::Connection;

use crate::error::Result;

/// SQL statement to create the members table.
pub const CREATE_MEMBERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    father_name TEXT,
    mother_name TEXT,
    nation_id TEXT,
    addres TEXT,
    email TEXT,
    phone TEXT,
    id_link TEXT,
    status INTEGER DEFAULT 0,
    project TEXT,
    apartment TEXT,
    amount REAL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now','localtime'))
)
";

/// SQL statement to create the `f_account` table.
///
/// Nothing reads or writes it; it exists so the database layout stays
/// compatible with existing deployments.
pub const CREATE_F_ACCOUNT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS f_account (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    detail TEXT
)
";

/// SQL statement to create the sessions table.
///
/// `data` holds the serialized session record; `expires_at` is a unix
/// timestamp in seconds.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY NOT NULL,
    data TEXT NOT NULL,
    expires_at INTEGER NOT NULL
)
";

/// SQL statement to index sessions by expiry.
pub const CREATE_SESSIONS_EXPIRY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_MEMBERS_TABLE,
    CREATE_F_ACCOUNT_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_SESSIONS_EXPIRY_INDEX,
];

/// Create any missing tables.
///
/// Safe to call any number of times; existing tables and rows are untouched.
///
/// # Errors
///
/// Returns an error if a statement fails to execute.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}
