//! Kaku - an event-driven Micropub and Webmention publishing pipeline.

mod bus;
mod cli;
mod config;
mod dispatch;
mod embed;
mod error;
mod event;
mod gather;
mod ledger;
mod logger;
mod mention;
mod post;
mod render;
mod utils;

#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::KakuConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    dispatch::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = KakuConfig::load(&cli.config)?;
    if let Some(path) = &config.paths.log_file {
        logger::init_log_file(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
    }

    match cli.command {
        Commands::Listen => cli::listen::listen(&config),
        Commands::Gather { file, force } => cli::gather::gather(&config, file, force),
        Commands::Publish { input } => cli::publish::publish(&config, &input),
        Commands::Replay => cli::replay::replay(&config),
    }
}
