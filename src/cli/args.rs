//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Kaku publishing pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: kaku.toml)
    #[arg(short = 'C', long, global = true, default_value = "kaku.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the event worker until interrupted
    #[command(visible_alias = "l")]
    Listen,

    /// Scan the content tree once and publish post events
    #[command(visible_alias = "g")]
    Gather {
        /// Only this content file (absolute, or relative to the content root)
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        file: Option<PathBuf>,

        /// Treat every post with metadata as changed
        #[arg(short, long)]
        force: bool,
    },

    /// Publish one event payload (`-` reads stdin)
    #[command(visible_alias = "p")]
    Publish {
        /// JSON file holding `type`, `action` and `data`
        #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
        input: PathBuf,
    },

    /// Republish stored events that were never handled
    #[command(visible_alias = "r")]
    Replay,
}
