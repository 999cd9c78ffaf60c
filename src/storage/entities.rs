use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded instance of wasted time. `timestamp` is milliseconds since the epoch and doubles
/// as the primary key, so two events can't share it.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct WasteEvent {
    pub timestamp: i64,
    pub wasted: u32,
}

impl WasteEvent {
    pub fn new(timestamp: i64, wasted: u32) -> Self {
        Self { timestamp, wasted }
    }

    /// Identity used when comparing in-memory history with stored events. An event whose minutes
    /// changed counts as a different event.
    pub fn key(&self) -> (i64, u32) {
        (self.timestamp, self.wasted)
    }

    pub fn moment(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Sums minutes of all events. Totals are kept wide so long histories don't overflow.
pub fn total_minutes<'a>(events: impl IntoIterator<Item = &'a WasteEvent>) -> u64 {
    events.into_iter().map(|v| u64::from(v.wasted)).sum()
}
