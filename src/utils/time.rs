use chrono::{DateTime, TimeZone};

/// Returns the first instant of the local day `moment` belongs to. Usually that is midnight, but
/// when a DST transition skips midnight the day starts at the first hour that exists.
pub fn day_start<Tz: TimeZone>(moment: &DateTime<Tz>) -> DateTime<Tz> {
    let date = moment.date_naive();
    let timezone = moment.timezone();
    (0..24)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|start| timezone.from_local_datetime(&start).earliest())
        .unwrap_or_else(|| moment.clone())
}

/// Normalizes a millisecond timestamp to the start of its day in `timezone`. This is the key used
/// to group events by day.
pub fn day_bucket<Tz: TimeZone>(timestamp: i64, timezone: &Tz) -> i64 {
    match timezone.timestamp_millis_opt(timestamp).earliest() {
        Some(moment) => day_start(&moment).timestamp_millis(),
        None => timestamp,
    }
}
