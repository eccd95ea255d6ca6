//! Condition-order trigger CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use trigger_config::load_config_or_default;
use trigger_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::ValidateConfig = cli.command {
        return cli::commands::validate::run(cli.config.as_deref()).await;
    }

    let config = load_config_or_default(cli.config.as_deref()).context("Failed to load configuration")?;

    // Setup logging
    let log_level = cli
        .log_level
        .map(|level| level.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = setup_logging(
        &log_level,
        cli.json_logs || config.logging.is_json(),
        config.logging.file.as_deref(),
    );

    // Execute command
    match cli.command {
        Commands::Replay(args) => cli::commands::replay::run(args, &config).await,
        Commands::Rules(args) => cli::commands::rules::run(args, &config).await,
        Commands::ValidateConfig => Ok(()),
    }
}
