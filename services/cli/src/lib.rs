mod cli;
mod commands;
mod demo;
mod infra;

use slot_sequencer::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
