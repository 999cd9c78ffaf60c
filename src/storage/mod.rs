//!  Storage is organized through [event_store::SqliteEventStore].
//!  The basic idea is:
//!   - There is a single database file in the application directory.
//!   - The database holds one table, keyed by event timestamp, storing minutes wasted.
//!   - The table layout is versioned. Moving to a newer version drops the table, see [schema].

pub mod entities;
pub mod event_store;
#[cfg(test)]
pub mod memory;
pub mod schema;

use std::path::PathBuf;

use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage at {path:?} is unavailable")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: BoxedError,
    },
    #[error("failed to read events")]
    ReadFailed(#[source] rusqlite::Error),
    #[error("failed to write events")]
    WriteFailed(#[source] rusqlite::Error),
    #[error("storage worker stopped unexpectedly")]
    Join(#[from] tokio::task::JoinError),
}
