use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use super::{entities::WasteEvent, event_store::EventStore, StorageError};

/// In-memory [EventStore] used to observe how the store is driven: it counts writes, tracks how
/// many reads overlap and can be told to fail.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<BTreeMap<i64, u32>>,
    pub read_delay: Option<Duration>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    writes: AtomicUsize,
    reads: AtomicUsize,
    reads_in_flight: AtomicUsize,
    max_reads_in_flight: AtomicUsize,
}

impl MemoryEventStore {
    pub fn with_events(events: impl IntoIterator<Item = WasteEvent>) -> Self {
        let store = Self::default();
        store
            .events
            .lock()
            .unwrap()
            .extend(events.into_iter().map(|v| (v.timestamp, v.wasted)));
        store
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<WasteEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(timestamp, wasted)| WasteEvent::new(*timestamp, *wasted))
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn max_reads_in_flight(&self) -> usize {
        self.max_reads_in_flight.load(Ordering::SeqCst)
    }

    fn failure() -> rusqlite::Error {
        rusqlite::Error::InvalidQuery
    }

    fn write(&self, operation: impl FnOnce(&mut BTreeMap<i64, u32>)) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed(Self::failure()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        operation(&mut self.events.lock().unwrap());
        Ok(())
    }
}

impl EventStore for MemoryEventStore {
    async fn upsert(&self, event: WasteEvent) -> Result<(), StorageError> {
        self.write(|events| {
            events.insert(event.timestamp, event.wasted);
        })
    }

    async fn get_all(&self) -> Result<Vec<WasteEvent>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reads_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed(Self::failure()));
        }
        Ok(self.events())
    }

    async fn delete(&self, timestamp: i64) -> Result<(), StorageError> {
        self.write(|events| {
            events.remove(&timestamp);
        })
    }

    async fn delete_latest(&self) -> Result<(), StorageError> {
        self.write(|events| {
            events.pop_last();
        })
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.write(|events| events.clear())
    }
}
