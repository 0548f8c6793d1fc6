use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use overhead::TrackerDomain;
use overhead::logging::init_logging;

mod commands;

use commands::AppContext;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "overhead")]
#[command(about = "Track aircraft and balloons passing over a saved location")]
#[command(version)]
struct Cli {
    /// Tracker domain, overriding the settings file
    #[arg(long, global = true, value_enum)]
    domain: Option<TrackerDomain>,

    /// Log debug output for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the provider and print what is overhead after every update
    Watch {
        /// Saved location to watch (defaults to the active one)
        #[arg(long)]
        location: Option<String>,
        /// Print each update as a JSON display bundle
        #[arg(long)]
        json: bool,
    },
    /// Scan three times the detection radius once for objects heard in the last hour
    Backfill {
        #[arg(long)]
        location: Option<String>,
    },
    /// Manage saved observer locations
    Locations {
        #[command(subcommand)]
        action: LocationsAction,
    },
    /// Show or clear archived encounters
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Write locations, settings and history to a JSON backup
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Restore a JSON backup, replacing each section it contains
    Import {
        input: PathBuf,
    },
    /// Show the recent flight path of a balloon payload
    PayloadHistory {
        callsign: String,
        /// Hours of telemetry to fetch (default 6)
        #[arg(long)]
        hours: Option<i64>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LocationsAction {
    List,
    /// Save a location, replacing any location with the same name
    Add {
        name: String,
        #[arg(allow_hyphen_values = true)]
        latitude: String,
        #[arg(allow_hyphen_values = true)]
        longitude: String,
        /// Detection radius in the domain's distance unit
        #[arg(long)]
        radius: Option<f64>,
    },
    Remove {
        name: String,
    },
    /// Make a saved location the active one
    Use {
        name: String,
        #[arg(long)]
        radius: Option<f64>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    Show {
        #[arg(long)]
        location: Option<String>,
        /// Include every location
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
    Clear {
        #[arg(long)]
        location: Option<String>,
        /// Clear every location, not just the selected one
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::load(cli.domain)?;

    match cli.command {
        Commands::Watch { location, json } => {
            commands::handle_watch(&ctx, location.as_deref(), json).await
        }
        Commands::Backfill { location } => {
            commands::handle_backfill(&ctx, location.as_deref()).await
        }
        Commands::Locations { action } => match action {
            LocationsAction::List => commands::handle_locations_list(&ctx),
            LocationsAction::Add {
                name,
                latitude,
                longitude,
                radius,
            } => commands::handle_locations_add(&ctx, &name, &latitude, &longitude, radius),
            LocationsAction::Remove { name } => commands::handle_locations_remove(&ctx, &name),
            LocationsAction::Use { name, radius } => {
                commands::handle_locations_use(&ctx, &name, radius)
            }
        },
        Commands::History { action } => match action {
            HistoryAction::Show {
                location,
                all,
                json,
            } => commands::handle_history_show(&ctx, location.as_deref(), all, json),
            HistoryAction::Clear { location, all } => {
                commands::handle_history_clear(&ctx, location.as_deref(), all)
            }
        },
        Commands::Export { output } => commands::handle_export(&ctx, output.as_deref()),
        Commands::Import { input } => commands::handle_import(&ctx, &input),
        Commands::PayloadHistory {
            callsign,
            hours,
            json,
        } => commands::handle_payload_history(&callsign, hours, json).await,
    }
}
