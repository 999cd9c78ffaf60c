use std::fmt::Display;

use chrono::TimeZone;
use serde::Serialize;

/// Money attributed to a day. Serialized as a plain number, or as a string once a currency is
/// attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cost {
    Amount(f64),
    Formatted(String),
}

impl Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cost::Amount(v) => write!(f, "{v:.2}"),
            Cost::Formatted(v) => write!(f, "{v}"),
        }
    }
}

fn with_unit(value: u64, unit: &str) -> String {
    if value > 1 {
        format!("{value} {unit}s")
    } else {
        format!("{value} {unit}")
    }
}

/// Formats minutes as e.g. "1 hour and 30 minutes". Zero parts are left out.
pub fn format_time(minutes: u64) -> String {
    if minutes == 0 {
        return "0 minutes".into();
    }

    let hours = minutes / 60;
    let minutes = minutes % 60;

    [(hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| with_unit(value, unit))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Formats the day of `timestamp` as "5 January 2024".
pub fn format_date<Tz: TimeZone>(timestamp: i64, timezone: &Tz) -> String
where
    Tz::Offset: Display,
{
    match timezone.timestamp_millis_opt(timestamp).earliest() {
        Some(moment) => moment.format("%-d %B %Y").to_string(),
        None => timestamp.to_string(),
    }
}

/// `rate` is per hour.
pub fn calculate_cost(total_minutes: u64, rate: f64, currency: Option<&str>) -> Cost {
    let cost = total_minutes as f64 / 60. * rate;
    match currency {
        Some(currency) => Cost::Formatted(format!("{cost:.2}{currency}")),
        None => Cost::Amount(cost),
    }
}
