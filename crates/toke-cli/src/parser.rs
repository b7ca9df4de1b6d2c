//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Install and run a local AI backend sized for this machine.
#[derive(Parser)]
#[command(name = "toke")]
#[command(about = "Install and run local AI model backends")]
#[command(version)]
pub struct Cli {
    /// Override the data directory for this invocation
    #[arg(long = "data-dir", env = "TOKE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// JSON file with backend settings
    #[arg(long = "settings", env = "TOKE_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
