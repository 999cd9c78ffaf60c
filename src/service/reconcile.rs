use std::collections::{BTreeMap, HashSet};

use crate::storage::entities::WasteEvent;

/// A single write needed to bring storage in line with the working history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Upsert(WasteEvent),
    Delete(i64),
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub upserted: usize,
    pub deleted: usize,
}

impl SyncReport {
    pub fn from_plan(plan: &[SyncOperation]) -> Self {
        plan.iter().fold(Self::default(), |mut report, operation| {
            match operation {
                SyncOperation::Upsert(_) => report.upserted += 1,
                SyncOperation::Delete(_) => report.deleted += 1,
            }
            report
        })
    }

    pub fn operations(&self) -> usize {
        self.upserted + self.deleted
    }
}

/// Diffs `history` against `stored` using `(timestamp, wasted)` as identity.
///
/// - History events missing from storage are upserted. When history holds the same timestamp
///   twice the later entry wins.
/// - Stored events missing from history are deleted, unless their timestamp is upserted in the
///   same plan. The upsert replaces them, and the plan never touches a key twice.
///
/// A history that already matches storage yields an empty plan.
pub fn plan_reconciliation(history: &[WasteEvent], stored: &[WasteEvent]) -> Vec<SyncOperation> {
    let history_keys = history.iter().map(WasteEvent::key).collect::<HashSet<_>>();
    let stored_keys = stored.iter().map(WasteEvent::key).collect::<HashSet<_>>();

    let latest = history
        .iter()
        .map(|v| (v.timestamp, *v))
        .collect::<BTreeMap<_, _>>();

    let upserts = latest
        .into_values()
        .filter(|v| !stored_keys.contains(&v.key()))
        .collect::<Vec<_>>();
    let upserted = upserts.iter().map(|v| v.timestamp).collect::<HashSet<_>>();

    let deletes = stored
        .iter()
        .filter(|v| !history_keys.contains(&v.key()) && !upserted.contains(&v.timestamp))
        .map(|v| SyncOperation::Delete(v.timestamp));

    upserts
        .into_iter()
        .map(SyncOperation::Upsert)
        .chain(deletes)
        .collect()
}
