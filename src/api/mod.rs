//! Surface meant for embedding applications: statistics as data, as JSON and as an exported file.

pub mod endpoint;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::{
    stats::{generate_stats, DayStats, StatsError},
    storage::event_store::EventStore,
};

pub const DEFAULT_EXPORT_FILE_NAME: &str = "waste-timer-stats.json";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("failed to serialize statistics")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write statistics into {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub async fn get_stats(
    storage: &impl EventStore,
    rate: Option<f64>,
    currency: Option<&str>,
) -> Result<Vec<DayStats>, ApiError> {
    Ok(generate_stats(storage, rate, currency)
        .await
        .inspect_err(|e| error!("Error getting stats: {e:?}"))?)
}

/// Statistics as pretty printed JSON.
pub async fn get_stats_json(
    storage: &impl EventStore,
    rate: Option<f64>,
    currency: Option<&str>,
) -> Result<String, ApiError> {
    let stats = get_stats(storage, rate, currency).await?;
    Ok(serde_json::to_string_pretty(&stats)?)
}

/// Writes the JSON statistics into `target`, [DEFAULT_EXPORT_FILE_NAME] in the current directory
/// when not given. A directory target gets the default file name appended. Returns the written
/// path.
pub async fn download_stats_json(
    storage: &impl EventStore,
    rate: Option<f64>,
    currency: Option<&str>,
    target: Option<&Path>,
) -> Result<PathBuf, ApiError> {
    let path = match target {
        Some(path) if path.is_dir() => path.join(DEFAULT_EXPORT_FILE_NAME),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(DEFAULT_EXPORT_FILE_NAME),
    };

    let json = get_stats_json(storage, rate, currency).await?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| ApiError::Io {
            path: path.clone(),
            source,
        })?;

    info!("Exported statistics into {path:?}");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use anyhow::Result;
    use serde_json::Value;
    use tempfile::tempdir;

    use crate::storage::{entities::WasteEvent, memory::MemoryEventStore};

    use super::{download_stats_json, get_stats_json, ApiError, DEFAULT_EXPORT_FILE_NAME};

    #[tokio::test]
    async fn test_stats_json() -> Result<()> {
        let store = MemoryEventStore::with_events([WasteEvent::new(1_704_412_800_000, 120)]);

        let json = get_stats_json(&store, Some(10.), Some("$")).await?;
        assert!(json.contains("\n  {"), "expected 2 space indentation: {json}");

        let value: Value = serde_json::from_str(&json)?;
        assert_eq!(value[0]["raw"]["total"], 120);
        assert_eq!(value[0]["total"], "2 hours");
        assert_eq!(value[0]["cost"], "20.00$");
        Ok(())
    }

    #[tokio::test]
    async fn test_download_into_directory() -> Result<()> {
        let dir = tempdir()?;
        let store = MemoryEventStore::with_events([WasteEvent::new(1_704_412_800_000, 5)]);

        let path = download_stats_json(&store, None, None, Some(dir.path())).await?;

        assert_eq!(path, dir.path().join(DEFAULT_EXPORT_FILE_NAME));
        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert!(value[0].get("cost").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_download_failure_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let store = MemoryEventStore::default();
        store.fail_reads.store(true, Ordering::SeqCst);

        let target = dir.path().join("stats.json");
        let result = download_stats_json(&store, None, None, Some(&target)).await;

        assert!(matches!(result, Err(ApiError::Stats(_))));
        assert!(!target.exists());
        Ok(())
    }
}
