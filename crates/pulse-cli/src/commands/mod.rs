//! CLI command implementations
//!
//! - `analyze` - Score plus generated insight
//! - `cache` - Insight cache maintenance (ping)
//! - `config` - Effective configuration display
//! - `score` - Local scoring, no generator call
//! - `serve` - Web server command

pub mod analyze;
pub mod cache;
pub mod config;
pub mod score;
pub mod serve;

// Re-export command functions for main.rs
pub use analyze::*;
pub use cache::*;
pub use config::*;
pub use score::*;
pub use serve::*;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pulse_core::{ActivityRecord, RuleExplanation, Tag};

/// Load variables from `path`, or from `.env` when no path is given
///
/// Returns the file that was read, if any.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to read env file {}", path.display()))?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e).context("Failed to read .env"),
        },
    }
}

/// Read and validate an activity record from a JSON file, or stdin for "-"
pub fn load_record(path: &Path) -> Result<ActivityRecord> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read activity record from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    let record: ActivityRecord = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid activity record in {}", path.display()))?;
    record.validate()?;
    Ok(record)
}

/// Print score, tags and per-rule effects
pub fn print_score(score: f64, tags: &[Tag], explanations: &[RuleExplanation]) {
    println!("   Score: {:.1}", score);
    if tags.is_empty() {
        println!("   Tags: (none)");
    } else {
        let names: Vec<&str> = tags.iter().map(Tag::as_str).collect();
        println!("   Tags: {}", names.join(", "));
    }
    println!();
    for e in explanations {
        println!(
            "   {:<20} {:>+7.2}  {}",
            e.rule_id.as_str(),
            e.effect_on_score,
            e.description
        );
    }
}
