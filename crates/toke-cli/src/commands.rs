//! Available subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Show detected RAM, CPU, GPU and free disk space
    Probe,

    /// List the model catalog for this platform
    Models {
        /// Include models this platform cannot run
        #[arg(long)]
        all: bool,
    },

    /// Recommend models that fit this machine
    Recommend,

    /// Install the server and weights for a model without starting it
    Setup {
        /// Catalog id, e.g. "qwen2.5-coder-7b-q4_k_m"
        model_id: String,
    },

    /// Install and run a backend until interrupted
    ///
    /// Without --model the best fit for this machine is chosen.
    Serve {
        /// Catalog id to serve
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show resolved paths for all toke directories
    Paths,
}
