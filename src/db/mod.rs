//! SQLite storage for the journal.

pub mod entries;
pub mod ledger;
mod store;

use crate::error::{JournalError, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            let report = embedded::migrations::runner().run(conn)?;
            for migration in report.applied_migrations() {
                tracing::info!(version = migration.version(), name = %migration.name(), "Applied schema migration");
            }
            Ok(())
        })
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| JournalError::persistence("connection lock poisoned"))?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| JournalError::persistence("connection lock poisoned"))?;
        f(&mut conn)
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Dates are stored as ISO text so lexical order matches calendar order.
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn date_from_sql(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Wrap a bad enum/text value as a conversion failure.
pub(crate) fn bad_value(idx: usize, what: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unknown {}: {}", what, raw).into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_has_journal_tables() {
        let db = Database::open_in_memory().unwrap();
        let tables: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table'
                     AND name NOT LIKE 'refinery_%' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .unwrap();
        assert_eq!(tables, vec!["entries", "migration_history"]);
    }

    #[test]
    fn reopening_a_file_database_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        Database::open(&path).unwrap();
        Database::open(&path).unwrap();
    }

    #[test]
    fn dates_round_trip_as_iso_text() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 21).unwrap();
        assert_eq!(date_to_sql(date), "2025-10-21");
        assert_eq!(date_from_sql(0, "2025-10-21").unwrap(), date);
        assert!(date_from_sql(0, "21/10/2025").is_err());
    }
}
