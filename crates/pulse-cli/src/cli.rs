//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pulse - Score a working day and explain the score
#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Productivity rule engine with cached LLM insights", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Environment file read before configuration is loaded
    ///
    /// Variables already set in the process environment win. A missing
    /// file is only an error when given explicitly.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable; same-origin only when omitted)
        #[arg(long = "allowed-origin")]
        allowed_origins: Vec<String>,
    },

    /// Score an activity record without calling the generator
    Score {
        /// Activity record JSON file ("-" reads stdin)
        #[arg(short, long)]
        file: PathBuf,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Score an activity record and attach an insight
    Analyze {
        /// Activity record JSON file ("-" reads stdin)
        #[arg(short, long)]
        file: PathBuf,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Insight cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show the effective configuration (credentials redacted)
    Config,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Check that the configured cache answers
    Ping,
}
