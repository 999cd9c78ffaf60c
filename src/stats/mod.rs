//! Day by day statistics computed from every stored event. Nothing is cached, each call reads
//! storage again.

pub mod format;

use std::{collections::BTreeMap, fmt::Display};

use chrono::{Local, TimeZone};
use format::{calculate_cost, format_date, format_time, Cost};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    storage::{
        entities::{total_minutes, WasteEvent},
        event_store::EventStore,
        StorageError,
    },
    utils::time::day_bucket,
};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("failed to generate statistics")]
    AggregationFailed(#[source] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawDayStats {
    /// Start of the day, milliseconds.
    pub day: i64,
    /// Minutes.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStats {
    pub day: String,
    pub total: String,
    pub history: Vec<WasteEvent>,
    pub raw: RawDayStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Cost>,
}

/// Statistics in local time, most recent day first.
pub async fn generate_stats(
    storage: &impl EventStore,
    rate: Option<f64>,
    currency: Option<&str>,
) -> Result<Vec<DayStats>, StatsError> {
    generate_stats_in(storage, &Local, rate, currency).await
}

pub async fn generate_stats_in<Tz: TimeZone>(
    storage: &impl EventStore,
    timezone: &Tz,
    rate: Option<f64>,
    currency: Option<&str>,
) -> Result<Vec<DayStats>, StatsError>
where
    Tz::Offset: Display,
{
    let events = storage
        .get_all()
        .await
        .map_err(StatsError::AggregationFailed)?;
    debug!("Aggregating {} events", events.len());
    Ok(aggregate(events, timezone, rate, currency))
}

/// Groups events by day. Events inside a day are sorted by timestamp, days are sorted from the
/// most recent. Cost is only attached when `rate` is given.
pub fn aggregate<Tz: TimeZone>(
    events: impl IntoIterator<Item = WasteEvent>,
    timezone: &Tz,
    rate: Option<f64>,
    currency: Option<&str>,
) -> Vec<DayStats>
where
    Tz::Offset: Display,
{
    let mut days = BTreeMap::<i64, Vec<WasteEvent>>::new();
    for event in events {
        days.entry(day_bucket(event.timestamp, timezone))
            .or_default()
            .push(event);
    }

    days.into_iter()
        .rev()
        .map(|(day, mut history)| {
            history.sort_by_key(|v| v.timestamp);
            let total = total_minutes(&history);
            DayStats {
                day: format_date(day, timezone),
                total: format_time(total),
                history,
                raw: RawDayStats { day, total },
                cost: rate.map(|rate| calculate_cost(total, rate, currency)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use anyhow::Result;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    use crate::storage::{entities::WasteEvent, memory::MemoryEventStore};

    use super::{aggregate, format::Cost, generate_stats_in, RawDayStats, StatsError};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> i64 {
        tz().from_local_datetime(
            &NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
        )
        .single()
        .unwrap()
        .timestamp_millis()
    }

    #[test]
    fn test_aggregate_by_day() {
        let events = [
            WasteEvent::new(at(5, 12, 0), 30),
            WasteEvent::new(at(6, 0, 1), 15),
            WasteEvent::new(at(5, 23, 59), 60),
            WasteEvent::new(at(5, 8, 0), 20),
        ];

        let stats = aggregate(events, &tz(), None, None);

        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].day, "6 January 2024");
        assert_eq!(stats[0].total, "15 minutes");
        assert_eq!(
            stats[0].raw,
            RawDayStats {
                day: at(6, 0, 0),
                total: 15
            }
        );

        assert_eq!(stats[1].day, "5 January 2024");
        assert_eq!(stats[1].total, "1 hour and 50 minutes");
        assert_eq!(
            stats[1].history,
            vec![
                WasteEvent::new(at(5, 8, 0), 20),
                WasteEvent::new(at(5, 12, 0), 30),
                WasteEvent::new(at(5, 23, 59), 60),
            ]
        );
        assert!(stats.iter().all(|v| v.cost.is_none()));
    }

    #[test]
    fn test_aggregate_with_cost() {
        let events = [WasteEvent::new(at(5, 12, 0), 120)];

        let stats = aggregate(events, &tz(), Some(10.), Some("$"));
        assert_eq!(stats[0].cost, Some(Cost::Formatted("20.00$".into())));

        let stats = aggregate(events, &tz(), Some(10.), None);
        assert_eq!(stats[0].cost, Some(Cost::Amount(20.)));
    }

    #[test]
    fn test_serialized_shape() -> Result<()> {
        let events = [WasteEvent::new(at(5, 12, 0), 90)];

        let json = serde_json::to_value(aggregate(events, &tz(), None, None))?;
        assert_eq!(
            json,
            serde_json::json!([{
                "day": "5 January 2024",
                "total": "1 hour and 30 minutes",
                "history": [{ "timestamp": at(5, 12, 0), "wasted": 90 }],
                "raw": { "day": at(5, 0, 0), "total": 90 },
            }])
        );

        let json = serde_json::to_value(aggregate(events, &tz(), Some(2.), None))?;
        assert_eq!(json[0]["cost"], serde_json::json!(3.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_from_storage() -> Result<()> {
        let store = MemoryEventStore::with_events([
            WasteEvent::new(at(4, 9, 0), 10),
            WasteEvent::new(at(5, 9, 0), 5),
        ]);

        let stats = generate_stats_in(&store, &tz(), None, None).await?;
        assert_eq!(
            stats.iter().map(|v| v.raw.total).collect::<Vec<_>>(),
            vec![5, 10]
        );
        assert!(generate_stats_in(&MemoryEventStore::default(), &tz(), None, None)
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_propagates_failure() -> Result<()> {
        let store = MemoryEventStore::default();
        store.fail_reads.store(true, Ordering::SeqCst);

        let result = generate_stats_in(&store, &tz(), None, None).await;
        assert!(matches!(result, Err(StatsError::AggregationFailed(_))));
        Ok(())
    }
}
