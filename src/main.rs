use advisor::commands::{confirm, export_data, plan, run_backtest, snapshot, stop_study, watchlist};
use advisor::context::AppContext;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "Momentum portfolio decision and backtesting engine")]
struct Cli {
    /// Data directory holding portfolio state, plans and snapshots
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or re-read) the action plan for a trading date
    Plan {
        /// Plan date, defaults to the last bar in the market data
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Path to the market data file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
    },
    /// Confirm a plan's pending actions and apply the trades
    Confirm {
        /// Date of the plan to confirm
        date: NaiveDate,
        /// Symbols to confirm; everything else pending is skipped
        #[arg(value_delimiter = ',', num_args = 0..)]
        symbols: Vec<String>,
        /// Confirm every pending action
        #[arg(long)]
        all: bool,
    },
    /// Replay the moving-average strategy over the full history
    Backtest {
        /// Path to the market data file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Symbols to replay, defaults to the whole universe
        #[arg(value_delimiter = ',', num_args = 0..)]
        symbols: Vec<String>,
        /// Stop rule applied on top of the exit signal
        #[arg(long, value_enum, default_value_t = run_backtest::StopKind::None)]
        stop: run_backtest::StopKind,
        /// Stop distance as a fraction, e.g. 0.15
        #[arg(long, default_value_t = 0.15)]
        threshold: f64,
    },
    /// Compare fixed and trailing stop variants against no stop
    StopStudy {
        /// Path to the market data file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Symbols to replay, defaults to the whole universe
        #[arg(value_delimiter = ',', num_args = 0..)]
        symbols: Vec<String>,
    },
    /// Show the annual baseline and year-to-date result
    Snapshot {
        /// Path to the market data file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
    },
    /// Show or edit the watchlist
    Watchlist {
        /// Symbols to add
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        add: Vec<String>,
        /// Symbols to remove
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        remove: Vec<String>,
    },
    /// Re-encode market data into the binary snapshot format
    ExportData {
        /// Source market data file (JSON or binary)
        input: PathBuf,
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { data_dir, command } = Cli::parse();
    let app = AppContext::initialize(data_dir)?;

    info!("Starting advisor. Not financial advice. Use at your own risk.");

    match command {
        Commands::Plan { date, data_file } => plan::run(&app, date, data_file)?,
        Commands::Confirm { date, symbols, all } => confirm::run(&app, date, &symbols, all)?,
        Commands::Backtest {
            data_file,
            symbols,
            stop,
            threshold,
        } => run_backtest::run(&app, data_file, symbols, stop, threshold)?,
        Commands::StopStudy { data_file, symbols } => stop_study::run(&app, data_file, symbols)?,
        Commands::Snapshot { data_file } => snapshot::run(&app, data_file)?,
        Commands::Watchlist { add, remove } => watchlist::run(&app, add, remove)?,
        Commands::ExportData { input, output } => export_data::run(&app, &input, output)?,
    }

    Ok(())
}
