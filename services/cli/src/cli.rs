use crate::commands::{
    import_tracks, load_strategy, sequence, show_strategy, ImportTracksArgs, LoadStrategyArgs,
    SequenceArgs, ShowStrategyArgs,
};
use crate::demo::run_demo;
use clap::{Parser, Subcommand};
use slot_sequencer::config::AppConfig;
use slot_sequencer::error::AppError;
use slot_sequencer::telemetry;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "slotseq",
    about = "Configure and exercise slot-based playlist sequencing from the command line",
    version
)]
struct Cli {
    /// Override the configured SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a track catalog CSV into the store
    ImportTracks(ImportTracksArgs),
    /// Create or replace a strategy from a JSON document
    LoadStrategy(LoadStrategyArgs),
    /// Print the normalized strategy for a channel and tier
    ShowStrategy(ShowStrategyArgs),
    /// Run the sequencer against the stored catalog
    Sequence(SequenceArgs),
    /// Play the built-in intensity and genre scenarios in memory (default command)
    Demo,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(db) = cli.db {
        config.store.database_path = db;
    }

    telemetry::init(&config.telemetry)?;
    debug!(environment = ?config.environment, db = %config.store.database_path.display(), "configuration loaded");

    match cli.command.unwrap_or(Command::Demo) {
        Command::ImportTracks(args) => import_tracks(&config, args),
        Command::LoadStrategy(args) => load_strategy(&config, args),
        Command::ShowStrategy(args) => show_strategy(&config, args),
        Command::Sequence(args) => sequence(&config, args),
        Command::Demo => run_demo(&config),
    }
}
