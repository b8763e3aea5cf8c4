use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "wallcal", version, about = "Wall calendar sync runner and cache inspector")]
struct Cli {
    /// Config file (JSON, or TOML by extension)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run calendar and weather sync until Ctrl-C
    Run,
    /// Run a single calendar sync cycle
    SyncOnce,
    /// Run a single weather sync cycle
    WeatherOnce,
    /// Show sync and weather status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List events for a day
    Agenda {
        /// Day to show (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show which days of a month have events
    Month {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Show the next upcoming event
    Next {
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = commands::load_config(cli.config.as_deref()).and_then(|config| {
        match cli.command {
            Commands::Run => commands::run::run(&config),
            Commands::SyncOnce => commands::sync::run_calendar(&config),
            Commands::WeatherOnce => commands::sync::run_weather(&config),
            Commands::Status { json } => commands::status::run(&config, json),
            Commands::Agenda { date, json } => {
                commands::agenda::day(&config, date.as_deref(), json)
            }
            Commands::Month { year, month, json } => {
                commands::agenda::month(&config, year, month, json)
            }
            Commands::Next { json } => commands::agenda::next(&config, json),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
