//! Pulse CLI - Productivity rule engine with cached LLM insights
//!
//! Usage:
//!   pulse score --file day.json      Score an activity record locally
//!   pulse analyze --file day.json    Score and attach a generated insight
//!   pulse cache ping                 Check the insight cache
//!   pulse config                     Show the effective configuration
//!   pulse serve --port 8000          Start the web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pulse_core::{CacheConfig, Config, RuleThresholds};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_file = commands::load_env_file(cli.env_file.as_deref())?;

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    match cli.command {
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => {
            let config = Config::from_env()?;
            commands::cmd_serve(config, &host, port, allowed_origins).await
        }
        Commands::Score { file, json } => {
            let thresholds = RuleThresholds::from_env()?;
            commands::cmd_score(&file, &thresholds, json)
        }
        Commands::Analyze { file, json } => {
            let config = Config::from_env()?;
            commands::cmd_analyze(&config, &file, json).await
        }
        Commands::Cache { action } => match action {
            CacheAction::Ping => commands::cmd_cache_ping(&CacheConfig::from_env()?).await,
        },
        Commands::Config => {
            let config = Config::from_env()?;
            commands::cmd_config(&config);
            Ok(())
        }
    }
}
