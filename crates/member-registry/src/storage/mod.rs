//! Storage layer for the member registry.
//!
//! This module provides `SQLite`-based persistent storage for members:
//! creation, substring search, lookup, editing and deletion. Visitor
//! sessions share the same database.

pub mod schema;
mod sessions;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection, OptionalExtension, Params};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::member::{Member, MemberUpdate, NewMember, CREATED_AT_FORMAT};

/// Column list shared by every query returning full member rows.
const MEMBER_COLUMNS: &str = "id, name, father_name, mother_name, nation_id, addres, email, \
     phone, id_link, status, project, apartment, amount, created_at";

/// The record store abstraction consumed by the request handlers.
pub trait MemberStore {
    /// Insert a new member and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn create(&self, member: &NewMember) -> Result<i64>;

    /// All members, newest id first, optionally filtered by a substring of
    /// name, apartment or phone.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list(&self, filter: Option<&str>) -> Result<Vec<Member>>;

    /// Look up one member.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get(&self, id: i64) -> Result<Option<Member>>;

    /// Overwrite the editable fields of a member.
    ///
    /// Returns `false` if no member has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn update(&self, id: i64, update: &MemberUpdate) -> Result<bool>;

    /// Remove a member.
    ///
    /// Returns `false` if no member has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete(&self, id: i64) -> Result<bool>;
}

/// `SQLite`-backed member store.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and makes sure the schema is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        trace!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the listing page read while another request writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        schema::ensure_schema(&conn)?;

        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::ensure_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-run schema creation on this connection.
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails.
    pub fn ensure_schema(&self) -> Result<()> {
        schema::ensure_schema(&self.conn)
    }

    /// Count members in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Run a member query with the given `WHERE` clause, newest id first.
    fn query_members(&self, where_clause: &str, params: impl Params) -> Result<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members {where_clause} ORDER BY id DESC"
        ))?;

        let members = stmt
            .query_map(params, Self::row_to_member)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(members)
    }

    /// Convert a database row to a Member struct.
    fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<Member> {
        let created_at_str: Option<String> = row.get(13)?;
        let created_at = created_at_str
            .as_deref()
            .map(|s| NaiveDateTime::parse_from_str(s, CREATED_AT_FORMAT))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e)))?
            .unwrap_or_default();

        Ok(Member {
            id: row.get(0)?,
            name: row.get(1)?,
            father_name: row.get(2)?,
            mother_name: row.get(3)?,
            nation_id: value_to_text(row.get(4)?),
            addres: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
            id_link: row.get(8)?,
            status: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
            project: row.get(10)?,
            apartment: row.get(11)?,
            amount: row.get::<_, Option<f64>>(12)?.unwrap_or(0.0),
            created_at,
        })
    }
}

impl MemberStore for Storage {
    fn create(&self, member: &NewMember) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO members
                (name, father_name, mother_name, nation_id, addres, id_link,
                 email, phone, apartment, amount)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                member.name.as_str(),
                member.father_name,
                member.mother_name,
                member.nation_id,
                member.addres,
                member.id_link,
                member.email,
                member.phone,
                member.apartment,
                member.amount,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted member with id {}", id);
        Ok(id)
    }

    fn list(&self, filter: Option<&str>) -> Result<Vec<Member>> {
        match filter.filter(|f| !f.is_empty()) {
            Some(filter) => self.query_members(
                r"
                WHERE name LIKE ?1 ESCAPE '\'
                   OR apartment LIKE ?1 ESCAPE '\'
                   OR phone LIKE ?1 ESCAPE '\'
                ",
                [format!("%{}%", escape_like(filter))],
            ),
            None => self.query_members("", []),
        }
    }

    fn get(&self, id: i64) -> Result<Option<Member>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?1"),
                [id],
                Self::row_to_member,
            )
            .optional()?;
        Ok(result)
    }

    fn update(&self, id: i64, update: &MemberUpdate) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE members SET name = ?1, email = ?2, phone = ?3, apartment = ?4, amount = ?5 \
             WHERE id = ?6",
            params![
                update.name.as_str(),
                update.email,
                update.phone,
                update.apartment,
                update.amount,
                id,
            ],
        )?;
        Ok(affected > 0)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM members WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

/// Escape `LIKE` wildcards so user text matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Read a loosely typed column as optional text.
///
/// Databases created with an INTEGER `nation_id` column hold numbers there.
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}
