pub mod report;
pub mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{print_endpoint, process_export_command, process_stats_command, PricingArgs};
use session::{process_add, process_today, process_track, process_undo};
use tracing::level_filters::LevelFilter;

use crate::{
    service::{ServiceConfig, WasteService},
    storage::event_store::SqliteEventStore,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "waste-timer", version, long_about = None)]
#[command(about = "Keeps track of the time you waste", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct ScopeArgs {
    #[arg(
        long = "all-days",
        help = "Work with the whole stored history instead of only today's entries"
    )]
    all_days: bool,
}

impl From<ScopeArgs> for ServiceConfig {
    fn from(value: ScopeArgs) -> Self {
        ServiceConfig {
            scope_to_today: !value.all_days,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Record wasted minutes")]
    Add {
        minutes: u32,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    #[command(about = "Remove the most recent entry")]
    Undo {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    #[command(about = "Show time wasted today")]
    Today {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    #[command(
        about = "Interactive session. Type a number to add minutes, 'u' to undo and 'q' to quit"
    )]
    Track {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    #[command(about = "Display statistics per day")]
    Stats {
        #[command(flatten)]
        pricing: PricingArgs,
        #[arg(long, help = "Print statistics as JSON")]
        json: bool,
    },
    #[command(about = "Export statistics into a JSON file")]
    Export {
        #[command(flatten)]
        pricing: PricingArgs,
        #[arg(
            long,
            short,
            help = "Target file or directory. Defaults to waste-timer-stats.json"
        )]
        output: Option<PathBuf>,
    },
    #[command(about = "Delete every stored entry")]
    Clear {},
    #[command(about = "Show what the HTTP stats endpoints answer")]
    Endpoint {
        #[arg(default_value = "/stats")]
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    if let Commands::Endpoint { path, method } = &args.commands {
        print_endpoint(path, method);
        return Ok(());
    }

    let storage = SqliteEventStore::open_in_dir(&app_dir)?;
    let service = |scope: ScopeArgs| WasteService::new(storage.clone(), DefaultClock, scope.into());

    match args.commands {
        Commands::Add { minutes, scope } => process_add(&service(scope), minutes).await,
        Commands::Undo { scope } => process_undo(&service(scope)).await,
        Commands::Today { scope } => process_today(&service(scope)).await,
        Commands::Track { scope } => process_track(&service(scope)).await,
        Commands::Stats { pricing, json } => process_stats_command(&storage, pricing, json).await,
        Commands::Export { pricing, output } => {
            process_export_command(&storage, pricing, output).await
        }
        Commands::Clear {} => {
            let service = service(ScopeArgs { all_days: true });
            service.clear_all().await?;
            println!("All stored entries were deleted");
            Ok(())
        }
        Commands::Endpoint { .. } => Ok(()),
    }
}
