use thiserror::Error;

/// Failures raised by the storage engine.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl DbError {
    /// True when the statement was rejected by a UNIQUE index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
                    && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_is_detected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (email TEXT NOT NULL UNIQUE)")
            .unwrap();
        conn.execute("INSERT INTO t (email) VALUES ('a@x.com')", [])
            .unwrap();

        let err: DbError = conn
            .execute("INSERT INTO t (email) VALUES ('a@x.com')", [])
            .unwrap_err()
            .into();

        assert!(err.is_unique_violation());
    }

    #[test]
    fn not_null_violation_is_not_unique() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (email TEXT NOT NULL UNIQUE)")
            .unwrap();

        let err: DbError = conn
            .execute("INSERT INTO t (email) VALUES (NULL)", [])
            .unwrap_err()
            .into();

        assert!(!err.is_unique_violation());
    }

    #[test]
    fn other_errors_are_not_violations() {
        let err = DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(!err.is_unique_violation());
    }
}
