//! `toke` command-line front end.
//!
//! Parses arguments, composes an [`Orchestrator`](toke_runtime::Orchestrator)
//! in [`bootstrap`], and routes each subcommand to a thin handler.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod progress;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use parser::Cli;
pub use progress::CliProgress;
