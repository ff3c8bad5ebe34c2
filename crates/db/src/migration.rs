use rusqlite::{params, Connection, OptionalExtension};

use crate::{DbError, Timestamp};

/// Schema migration contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

pub(crate) fn apply(
    conn: &mut Connection,
    migrations: &[(String, Migration)],
) -> Result<usize, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            module TEXT NOT NULL,
            id TEXT NOT NULL,
            applied_at INTEGER NOT NULL,
            PRIMARY KEY (module, id)
        );",
    )?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let done: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2",
                params![module, migration.id],
                |row| row.get(0),
            )
            .optional()?;
        if done.is_some() {
            continue;
        }

        let wrap = |source| DbError::Migration {
            module: module.clone(),
            id: migration.id.to_string(),
            source,
        };

        let tx = conn.transaction()?;
        tx.execute_batch(migration.up).map_err(wrap)?;
        tx.execute(
            "INSERT INTO schema_migrations (module, id, applied_at) VALUES (?1, ?2, ?3)",
            params![module, migration.id, Timestamp::now()],
        )?;
        tx.commit()?;

        tracing::info!(target: "shelf-db", module = %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use crate::{Database, Migration};

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "widgets".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE widgets (id INTEGER PRIMARY KEY);",
            },
        )]
    }

    #[test]
    fn migrations_apply_once() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.apply_migrations(&migrations()).unwrap(), 1);
        assert_eq!(db.apply_migrations(&migrations()).unwrap(), 0);
    }

    #[test]
    fn broken_migration_is_not_recorded() {
        let db = Database::open_in_memory().unwrap();
        let broken = vec![(
            "widgets".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE widgets (",
            },
        )];

        let err = db.apply_migrations(&broken).unwrap_err();
        assert!(err.to_string().contains("widgets/001_init"));

        // A corrected migration with the same id still runs.
        assert_eq!(db.apply_migrations(&migrations()).unwrap(), 1);
    }
}
