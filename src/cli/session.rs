use anyhow::Result;
use chrono::Local;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::{
    service::{undo_last, InitialState, WasteService},
    stats::format::format_time,
    storage::{entities::WasteEvent, event_store::EventStore},
    utils::clock::Clock,
};

pub async fn process_add<S, C>(service: &WasteService<S, C>, minutes: u32) -> Result<()>
where
    S: EventStore + Send + Sync + 'static,
    C: Clock,
{
    let InitialState {
        total_minutes,
        mut history,
    } = service.initialize().await;

    history.push(service.record_event(minutes));
    service.force_sync(&history).await?;

    println!(
        "Added {}. Wasted {} so far",
        format_time(minutes.into()),
        format_time(total_minutes + u64::from(minutes))
    );
    Ok(())
}

pub async fn process_undo<S, C>(service: &WasteService<S, C>) -> Result<()>
where
    S: EventStore + Send + Sync + 'static,
    C: Clock,
{
    let InitialState {
        total_minutes,
        history,
    } = service.initialize().await;

    if history.is_empty() {
        println!("Nothing to undo");
        return Ok(());
    }

    let undone = undo_last(&history);
    service.force_sync(&undone.new_history).await?;

    println!(
        "Removed {}. Wasted {} so far",
        format_time(undone.removed_minutes.into()),
        format_time(total_minutes.saturating_sub(undone.removed_minutes.into()))
    );
    Ok(())
}

pub async fn process_today<S, C>(service: &WasteService<S, C>) -> Result<()>
where
    S: EventStore + Send + Sync + 'static,
    C: Clock,
{
    let InitialState {
        total_minutes,
        history,
    } = service.initialize().await;

    for event in &history {
        println!("{}\t{}", event_time(event), format_time(event.wasted.into()));
    }
    println!("Wasted {}", format_time(total_minutes));
    println!("{} entries stored", service.count_persisted().await);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackCommand {
    Add(u32),
    Undo,
    Quit,
}

/// Parses a line of the interactive session. `15` and `+15` add minutes, `u`/`undo` removes the
/// last entry, `q`/`quit` ends the session.
pub fn parse_track_command(line: &str) -> Option<TrackCommand> {
    match line.trim() {
        "u" | "undo" => Some(TrackCommand::Undo),
        "q" | "quit" | "exit" => Some(TrackCommand::Quit),
        v => v
            .strip_prefix('+')
            .unwrap_or(v)
            .parse::<u32>()
            .ok()
            .map(TrackCommand::Add),
    }
}

/// Interactive session. Every change is synced in the background, leaving the session waits for
/// the final state to be written.
pub async fn process_track<S, C>(service: &WasteService<S, C>) -> Result<()>
where
    S: EventStore + Send + Sync + 'static,
    C: Clock,
{
    let InitialState {
        mut total_minutes,
        mut history,
    } = service.initialize().await;

    println!("Wasted {} today", format_time(total_minutes));

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_track_command(&line) {
            Some(TrackCommand::Add(minutes)) => {
                history.push(service.record_event(minutes));
                total_minutes += u64::from(minutes);
            }
            Some(TrackCommand::Undo) => {
                let undone = undo_last(&history);
                history = undone.new_history;
                total_minutes = total_minutes.saturating_sub(undone.removed_minutes.into());
            }
            Some(TrackCommand::Quit) => break,
            None => {
                println!("Unknown command {line:?}");
                continue;
            }
        }
        debug!("History has {} entries", history.len());
        service.request_sync(history.clone());
        println!("Wasted {}", format_time(total_minutes));
    }

    let report = service.force_sync(&history).await?;
    debug!("Final sync {report:?}");
    Ok(())
}

/// Local wall clock time of an event.
pub(super) fn event_time(event: &WasteEvent) -> String {
    event
        .moment()
        .map(|v| v.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| event.timestamp.to_string())
}
