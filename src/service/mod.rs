//! Keeps a caller-owned working history in sync with an [EventStore].
//!
//! The history itself lives with the caller (one session). [WasteService] only reconciles it
//! against storage: [WasteService::request_sync] is debounced and skipped while another pass is
//! running, [WasteService::force_sync] runs right away and reports the outcome.

pub mod reconcile;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use chrono::Local;
use futures::future::join_all;
use reconcile::{plan_reconciliation, SyncOperation, SyncReport};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    storage::{
        entities::{total_minutes, WasteEvent},
        event_store::EventStore,
        StorageError,
    },
    utils::{clock::Clock, time::day_start},
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Restricts loading and reconciliation to events recorded since local midnight of the day the
    /// session was initialized, or since the oldest entry of the synced history. Without it
    /// the whole stored history is loaded and compared.
    pub scope_to_today: bool,
    pub debounce: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scope_to_today: true,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to sync history with storage")]
    SyncFailed(#[source] StorageError),
    #[error("failed to clear storage")]
    ClearFailed(#[source] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitialState {
    pub total_minutes: u64,
    pub history: Vec<WasteEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UndoResult {
    pub new_history: Vec<WasteEvent>,
    pub removed_minutes: u32,
}

/// Removes the most recent entry of `history`.
pub fn undo_last(history: &[WasteEvent]) -> UndoResult {
    match history.split_last() {
        Some((last, rest)) => UndoResult {
            new_history: rest.to_vec(),
            removed_minutes: last.wasted,
        },
        None => UndoResult::default(),
    }
}

struct ServiceInner<S, C> {
    storage: S,
    clock: C,
    config: ServiceConfig,
    loaded: AtomicBool,
    /// Held for the whole duration of a reconciliation pass.
    sync_lock: AsyncMutex<()>,
    pending: Mutex<Option<CancellationToken>>,
    /// Local midnight at the time of [WasteService::initialize].
    session_start: Mutex<Option<i64>>,
}

/// Reconciliation service. Clones share state, so one instance should be created by the
/// application and handed around.
pub struct WasteService<S, C> {
    inner: Arc<ServiceInner<S, C>>,
}

impl<S, C> Clone for WasteService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S, C> WasteService<S, C>
where
    S: EventStore + Send + Sync + 'static,
    C: Clock,
{
    pub fn new(storage: S, clock: C, config: ServiceConfig) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                storage,
                clock,
                config,
                loaded: AtomicBool::new(false),
                sync_lock: AsyncMutex::new(()),
                pending: Mutex::new(None),
                session_start: Mutex::new(None),
            }),
        }
    }

    /// Whether [WasteService::initialize] has finished. Debounced syncs are dropped until then, so
    /// that an empty history can't wipe stored events before they were loaded.
    pub fn is_ready(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Loads the working history. Never fails: if storage can't be read the session starts empty.
    pub async fn initialize(&self) -> InitialState {
        let today = self.today_start();
        *self
            .inner
            .session_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(today);
        let start = self.inner.config.scope_to_today.then_some(today);

        let state = match self.inner.storage.get_all().await {
            Ok(events) => {
                let mut history = scoped(events, start);
                history.sort_by_key(|v| v.timestamp);
                InitialState {
                    total_minutes: total_minutes(&history),
                    history,
                }
            }
            Err(e) => {
                error!("Failed to load from storage: {e:?}");
                InitialState::default()
            }
        };
        self.inner.loaded.store(true, Ordering::Release);
        debug!(
            "Loaded {} events, {} minutes",
            state.history.len(),
            state.total_minutes
        );
        state
    }

    /// Creates an event stamped with the current time. Nothing is written until the history
    /// containing it is synced.
    pub fn record_event(&self, minutes: u32) -> WasteEvent {
        WasteEvent::new(self.inner.clock.time().timestamp_millis(), minutes)
    }

    /// Schedules a reconciliation of `history` after the debounce delay. A newer request replaces
    /// a pending one. If a pass is still running when the delay elapses the request is dropped;
    /// the next request or [WasteService::force_sync] picks up the latest history.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_sync(&self, history: Vec<WasteEvent>) {
        if !self.is_ready() {
            debug!("Initial data isn't loaded yet, ignoring sync request");
            return;
        }

        let token = CancellationToken::new();
        if let Some(previous) = self.replace_pending(Some(token.clone())) {
            previous.cancel();
        }

        let service = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Pending sync superseded");
                }
                _ = service.inner.clock.sleep(service.inner.config.debounce) => {
                    service.debounced_sync(&history).await;
                }
            }
        });
    }

    /// Cancels any pending debounced sync and reconciles `history` now. Waits for a pass that is
    /// already running, so when this returns `Ok` storage reflects `history`.
    pub async fn force_sync(&self, history: &[WasteEvent]) -> Result<SyncReport, ServiceError> {
        if let Some(pending) = self.replace_pending(None) {
            pending.cancel();
        }
        let _guard = self.inner.sync_lock.lock().await;
        self.perform_sync(history)
            .await
            .inspect_err(|e| error!("Failed to sync history with storage: {e:?}"))
            .map_err(ServiceError::SyncFailed)
    }

    /// Number of stored events, or 0 if storage can't be read.
    pub async fn count_persisted(&self) -> usize {
        match self.inner.storage.get_all().await {
            Ok(events) => events.len(),
            Err(e) => {
                error!("Failed to get stored items count: {e:?}");
                0
            }
        }
    }

    pub async fn clear_all(&self) -> Result<(), ServiceError> {
        match self.inner.storage.clear().await {
            Ok(()) => {
                info!("All storage data cleared successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to clear storage: {e:?}");
                Err(ServiceError::ClearFailed(e))
            }
        }
    }

    async fn debounced_sync(&self, history: &[WasteEvent]) {
        let Ok(_guard) = self.inner.sync_lock.try_lock() else {
            debug!("Sync already in flight, skipping");
            return;
        };
        if let Err(e) = self.perform_sync(history).await {
            error!("Failed to sync history with storage: {e:?}");
        }
    }

    /// One reconciliation pass. Callers hold `sync_lock`.
    async fn perform_sync(&self, history: &[WasteEvent]) -> Result<SyncReport, StorageError> {
        let start = self.scope_start(history);
        let stored = scoped(self.inner.storage.get_all().await?, start);
        let plan = plan_reconciliation(history, &stored);
        let report = SyncReport::from_plan(&plan);

        if plan.is_empty() {
            debug!("Storage already matches history");
            return Ok(report);
        }

        // Every operation is awaited before the first failure is reported.
        let results = join_all(plan.iter().map(|operation| self.apply(operation))).await;
        results.into_iter().collect::<Result<Vec<_>, _>>()?;

        info!("Synced {} operations to storage", report.operations());
        Ok(report)
    }

    async fn apply(&self, operation: &SyncOperation) -> Result<(), StorageError> {
        match *operation {
            SyncOperation::Upsert(event) => self.inner.storage.upsert(event).await,
            SyncOperation::Delete(timestamp) => self.inner.storage.delete(timestamp).await,
        }
    }

    /// Oldest timestamp a pass compares, `None` when the whole store is compared. Starts at the
    /// midnight seen by [WasteService::initialize] and reaches back to the oldest entry of
    /// `history`, so a session running past midnight still owns what it recorded before.
    fn scope_start(&self, history: &[WasteEvent]) -> Option<i64> {
        if !self.inner.config.scope_to_today {
            return None;
        }
        let session = *self
            .inner
            .session_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let session = session.unwrap_or_else(|| self.today_start());
        Some(history.iter().map(|v| v.timestamp).fold(session, i64::min))
    }

    fn today_start(&self) -> i64 {
        day_start(&self.inner.clock.time().with_timezone(&Local)).timestamp_millis()
    }

    fn replace_pending(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, token)
    }
}

fn scoped(events: Vec<WasteEvent>, start: Option<i64>) -> Vec<WasteEvent> {
    match start {
        Some(start) => events.into_iter().filter(|v| v.timestamp >= start).collect(),
        None => events,
    }
}
