//! Command handlers.
//!
//! Each handler is a thin wrapper: signature
//! `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`, it calls the
//! orchestrator and formats the answer for the terminal. Installation,
//! supervision and recommendation logic stay in the library crates.

pub mod models;
pub mod paths;
pub mod probe;
pub mod recommend;
pub mod serve;
pub mod setup;
