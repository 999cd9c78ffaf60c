//! Versioning of the on-disk layout.
//!
//! Each version bump redefines how events are encoded, so an upgrade drops the previous table and
//! creates a fresh one. Data stored under an older version is lost. There is intentionally no
//! field-level migration.

use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, warn};

pub const SCHEMA_VERSION: i32 = 6;
pub const TABLE_NAME: &str = "store";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database version ({found}) is newer than supported schema ({SCHEMA_VERSION})")]
    TooNew { found: i32 },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub fn read_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Brings the database to [SCHEMA_VERSION]. Returns the version that was found on disk.
pub fn upgrade(conn: &mut Connection) -> Result<i32, SchemaError> {
    // Immediate transaction so that two processes opening a fresh database don't both recreate
    // the table.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let found = read_version(&tx)?;

    if found > SCHEMA_VERSION {
        return Err(SchemaError::TooNew { found });
    }

    if found == SCHEMA_VERSION {
        debug!("Database is at version {found}");
        return Ok(found);
    }

    if found > 0 {
        warn!("Upgrading database from version {found} to {SCHEMA_VERSION}, stored events are dropped");
    }

    tx.execute_batch(&format!(
        "
        DROP TABLE IF EXISTS {TABLE_NAME};
        CREATE TABLE {TABLE_NAME} (
            timestamp INTEGER PRIMARY KEY,
            wasted    INTEGER NOT NULL CHECK (wasted >= 0)
        );
        "
    ))?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    debug!("Database upgraded to version {SCHEMA_VERSION}");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use rusqlite::Connection;

    use super::{read_version, upgrade, SchemaError, SCHEMA_VERSION};

    #[test]
    fn test_fresh_database_gets_current_version() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;
        assert_eq!(upgrade(&mut conn)?, 0);
        assert_eq!(read_version(&conn)?, SCHEMA_VERSION);
        // Second run is a no-op.
        assert_eq!(upgrade(&mut conn)?, SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn test_upgrade_drops_previous_layout() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            CREATE TABLE store (id INTEGER PRIMARY KEY AUTOINCREMENT, payload TEXT);
            INSERT INTO store (payload) VALUES ('{\"wasted\": 5}');
            PRAGMA user_version = 5;
            ",
        )?;

        assert_eq!(upgrade(&mut conn)?, 5);

        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM store", [], |row| row.get(0))?;
        assert_eq!(rows, 0);
        conn.execute(
            "INSERT INTO store (timestamp, wasted) VALUES (?1, ?2)",
            (1_i64, 3_u32),
        )?;
        Ok(())
    }

    #[test]
    fn test_newer_version_is_rejected() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA user_version = 7;")?;
        let result = upgrade(&mut conn);
        assert!(matches!(result, Err(SchemaError::TooNew { found: 7 })));
        Ok(())
    }

    #[test]
    fn test_negative_minutes_are_rejected() -> Result<()> {
        let mut conn = Connection::open_in_memory()?;
        upgrade(&mut conn)?;
        let result = conn.execute(
            "INSERT INTO store (timestamp, wasted) VALUES (?1, ?2)",
            (1_i64, -3_i64),
        );
        assert!(result.is_err());
        Ok(())
    }
}
