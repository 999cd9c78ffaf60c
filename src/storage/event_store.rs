use std::{
    future::Future,
    ops::Deref,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rusqlite::{params, Connection, Transaction};
use tracing::debug;

use super::{
    entities::WasteEvent,
    schema::{self, TABLE_NAME},
    StorageError,
};

pub const DATABASE_NAME: &str = "waste-timer";

/// How long a write waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Interface for abstracting storage of events. The store behaves like a flat key/value table:
/// the key is [WasteEvent::timestamp], the value is [WasteEvent::wasted].
pub trait EventStore {
    /// Creates or overwrites the event with the same timestamp.
    fn upsert(&self, event: WasteEvent) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Retrieves every stored event. Order isn't guaranteed.
    fn get_all(&self) -> impl Future<Output = Result<Vec<WasteEvent>, StorageError>> + Send;

    /// Removes the event if present. Missing events are not an error.
    fn delete(&self, timestamp: i64) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removes the event with the largest timestamp, if any.
    fn delete_latest(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<T: Deref + Sync> EventStore for T
where
    T::Target: EventStore + Sync,
{
    fn upsert(&self, event: WasteEvent) -> impl Future<Output = Result<(), StorageError>> + Send {
        self.deref().upsert(event)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<WasteEvent>, StorageError>> + Send {
        self.deref().get_all()
    }

    fn delete(&self, timestamp: i64) -> impl Future<Output = Result<(), StorageError>> + Send {
        self.deref().delete(timestamp)
    }

    fn delete_latest(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        self.deref().delete_latest()
    }

    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send {
        self.deref().clear()
    }
}

/// The main realization of [EventStore], backed by a SQLite file.
///
/// A single connection is opened (and upgraded, see [schema]) in [SqliteEventStore::open] and
/// reused by every operation. Operations run on tokio's blocking pool, one at a time, each inside
/// its own transaction. A write is reported as successful only once its transaction commits.
#[derive(Clone)]
pub struct SqliteEventStore {
    path: Arc<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let conn = Self::connect(&path).map_err(|source| StorageError::StorageUnavailable {
            path: path.clone(),
            source,
        })?;
        debug!("Database opened successfully at {path:?}");

        Ok(Self {
            path: Arc::new(path),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens `waste-timer.sqlite3` inside `dir`.
    pub fn open_in_dir(dir: &Path) -> Result<Self, StorageError> {
        Self::open(Self::database_path(dir))
    }

    pub fn database_path(dir: &Path) -> PathBuf {
        dir.join(format!("{DATABASE_NAME}.sqlite3"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> Result<Connection, super::BoxedError> {
        if let Some(parent) = path.parent().filter(|v| !v.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::upgrade(&mut conn)?;
        Ok(conn)
    }

    async fn with_conn<T, F>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            // A panic in another operation can't leave the connection half way through a
            // transaction: the transaction is rolled back when dropped.
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            operation(&mut conn)
        })
        .await?
    }

    /// Runs `operation` inside a write transaction and commits it.
    async fn write<F>(&self, operation: F) -> Result<(), StorageError>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<()> + Send + 'static,
    {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(StorageError::WriteFailed)?;
            operation(&tx).map_err(StorageError::WriteFailed)?;
            tx.commit().map_err(StorageError::WriteFailed)
        })
        .await
    }
}

impl EventStore for SqliteEventStore {
    async fn upsert(&self, event: WasteEvent) -> Result<(), StorageError> {
        debug!("Storing event {event:?}");
        self.write(move |tx| {
            tx.execute(
                &format!(
                    "INSERT INTO {TABLE_NAME} (timestamp, wasted) VALUES (?1, ?2)
                     ON CONFLICT(timestamp) DO UPDATE SET wasted = excluded.wasted"
                ),
                params![event.timestamp, event.wasted],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<WasteEvent>, StorageError> {
        let events = self
            .with_conn(|conn| {
                let read = || -> rusqlite::Result<Vec<WasteEvent>> {
                    let mut stmt =
                        conn.prepare(&format!("SELECT timestamp, wasted FROM {TABLE_NAME}"))?;
                    let rows = stmt.query_map([], |row| {
                        Ok(WasteEvent {
                            timestamp: row.get(0)?,
                            wasted: row.get(1)?,
                        })
                    })?;
                    rows.collect()
                };
                read().map_err(StorageError::ReadFailed)
            })
            .await?;
        debug!("Read {} events", events.len());
        Ok(events)
    }

    async fn delete(&self, timestamp: i64) -> Result<(), StorageError> {
        debug!("Deleting event {timestamp}");
        self.write(move |tx| {
            tx.execute(
                &format!("DELETE FROM {TABLE_NAME} WHERE timestamp = ?1"),
                params![timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_latest(&self) -> Result<(), StorageError> {
        debug!("Deleting latest event");
        self.write(|tx| {
            tx.execute(
                &format!(
                    "DELETE FROM {TABLE_NAME}
                     WHERE timestamp = (SELECT MAX(timestamp) FROM {TABLE_NAME})"
                ),
                [],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        debug!("Clearing all events");
        self.write(|tx| {
            tx.execute(&format!("DELETE FROM {TABLE_NAME}"), [])?;
            Ok(())
        })
        .await
    }
}
