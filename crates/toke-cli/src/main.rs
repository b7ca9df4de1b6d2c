//! `toke` entry point.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use toke_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads TOKE_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(CliConfig {
        data_dir: cli.data_dir,
        settings_file: cli.settings,
    })
    .await?;

    match command {
        Commands::Probe => handlers::probe::execute(&ctx)?,
        Commands::Models { all } => handlers::models::execute(&ctx, all)?,
        Commands::Recommend => handlers::recommend::execute(&ctx)?,
        Commands::Setup { model_id } => handlers::setup::execute(&ctx, &model_id).await?,
        Commands::Serve { model } => handlers::serve::execute(&ctx, model).await?,
        Commands::Paths => handlers::paths::execute(&ctx)?,
    }

    Ok(())
}
