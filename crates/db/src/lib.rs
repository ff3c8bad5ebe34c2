//! SQLite storage handle shared by every module.
//!
//! A single connection sits behind a mutex; callers are expected to run
//! storage work on a blocking thread (`tokio::task::spawn_blocking`).

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};

mod error;
mod migration;
mod timestamp;

pub use error::DbError;
pub use migration::Migration;
pub use timestamp::Timestamp;

/// Handle to the SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DbError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        tracing::info!(target: "shelf-db", path = %path.display(), "database opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database. Used by tests and throwaway tooling.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` against the connection. Each statement autocommits.
    pub fn with_conn<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`; any error
    /// drops the transaction, which rolls it back.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Apply every migration not yet recorded in `schema_migrations`.
    /// Returns how many were applied.
    pub fn apply_migrations(&self, migrations: &[(String, Migration)]) -> Result<usize, DbError> {
        migration::apply(&mut self.conn.lock(), migrations)
    }
}
