//! Destination store: the statement-execution capability the writer needs and
//! its `SQLite` implementation.
//!
//! The loader owns one store for the whole run and lends it to the workers;
//! `SqliteStore` serializes statements behind a single connection mutex.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use itertools::Itertools;
use log::debug;
use rusqlite::{Connection, params_from_iter};

use crate::error::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on bound parameters in one statement.
pub const SQLITE_MAX_VARIABLES: usize = 32_766;

pub trait Store: Send + Sync {
    /// Runs one statement with positional text parameters, returning the
    /// number of rows it changed.
    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize, StoreError>;

    /// Creates `table` with one text column per entry in `columns` unless it
    /// already exists.
    fn ensure_table(&self, table: &str, columns: &[String]) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened {path:?} (journal_mode={mode})");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Reads every row of `table` as text, ordered by insertion, for checks
    /// and reporting.
    pub fn fetch_all(
        &self,
        table: &str,
        columns: &[String],
    ) -> Result<Vec<Vec<String>>, StoreError> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.iter().map(|c| quote_identifier(c)).join(", "),
            quote_identifier(table)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            (0..columns.len())
                .map(|idx| row.get::<_, Option<String>>(idx).map(Option::unwrap_or_default))
                .collect::<Result<Vec<_>, _>>()
        })?;
        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl Store for SqliteStore {
    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize, StoreError> {
        let conn = self.lock_conn()?;
        Ok(conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn ensure_table(&self, table: &str, columns: &[String]) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT{})",
            quote_identifier(table),
            columns
                .iter()
                .map(|c| format!(", {} TEXT", quote_identifier(c)))
                .join("")
        );
        conn.execute_batch(&sql)?;
        Ok(())
    }
}

/// Double-quotes an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
