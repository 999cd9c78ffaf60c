use std::path::PathBuf;

use ansi_term::Style;
use anyhow::Result;

use super::session::event_time;
use crate::{
    api::{download_stats_json, endpoint::respond, get_stats, get_stats_json},
    stats::{format::format_time, DayStats},
    storage::event_store::EventStore,
};

#[derive(Debug, Clone, clap::Args)]
pub struct PricingArgs {
    #[arg(long, help = "Hourly rate used to compute the cost of wasted time")]
    rate: Option<f64>,
    #[arg(
        long,
        requires = "rate",
        help = "Currency symbol appended to the cost, for example $"
    )]
    currency: Option<String>,
}

pub async fn process_stats_command(
    storage: &impl EventStore,
    PricingArgs { rate, currency }: PricingArgs,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", get_stats_json(storage, rate, currency.as_deref()).await?);
    } else {
        let stats = get_stats(storage, rate, currency.as_deref()).await?;
        print!("{}", render_stats(&stats));
    }
    Ok(())
}

pub async fn process_export_command(
    storage: &impl EventStore,
    PricingArgs { rate, currency }: PricingArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let path = download_stats_json(storage, rate, currency.as_deref(), output.as_deref()).await?;
    println!("Statistics saved into {}", path.display());
    Ok(())
}

pub fn print_endpoint(path: &str, method: &str) {
    let response = respond(path, method);
    println!("{}", response.status);
    for (name, value) in &response.headers {
        println!("{name}: {value}");
    }
    if !response.body.is_empty() {
        println!();
        println!("{}", response.body);
    }
}

/// One block per day: a bold header with the total (and cost), then one line per entry.
pub fn render_stats(stats: &[DayStats]) -> String {
    if stats.is_empty() {
        return "No time wasted yet\n".into();
    }

    let header = Style::new().bold();
    let mut output = String::new();
    for day in stats {
        let mut title = format!("{}\t{}", day.day, day.total);
        if let Some(cost) = &day.cost {
            title += &format!("\t{cost}");
        }
        output += &format!("{}\n", header.paint(title));

        for event in &day.history {
            output += &format!(
                "  {}\t{}\n",
                event_time(event),
                format_time(event.wasted.into())
            );
        }
        output += "\n";
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use crate::{stats::aggregate, storage::entities::WasteEvent};

    use super::render_stats;

    #[test]
    fn test_render_stats() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let stats = aggregate(
            [
                WasteEvent::new(1_704_412_800_000, 30),
                WasteEvent::new(1_704_416_400_000, 45),
            ],
            &tz,
            Some(20.),
            Some("$"),
        );

        let output = render_stats(&stats);
        assert!(output.contains("5 January 2024"));
        assert!(output.contains("1 hour and 15 minutes"));
        assert!(output.contains("25.00$"));
        assert_eq!(output.lines().filter(|v| v.starts_with("  ")).count(), 2);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_stats(&[]), "No time wasted yet\n");
    }
}
