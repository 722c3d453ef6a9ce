//! Score command implementation

use std::path::Path;

use anyhow::Result;
use pulse_core::{RuleThresholds, ScoreResult, ScoringEngine};

use super::{load_record, print_score};

/// Score the record in `path` against `thresholds`
pub fn score_file(path: &Path, thresholds: &RuleThresholds) -> Result<ScoreResult> {
    let record = load_record(path)?;
    Ok(ScoringEngine::new(*thresholds).score(&record))
}

pub fn cmd_score(path: &Path, thresholds: &RuleThresholds, json: bool) -> Result<()> {
    let result = score_file(path, thresholds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!("📊 Productivity Score");
    println!("   ─────────────────────────────────────────────────────────────");
    print_score(result.score, &result.tags, &result.explanations);
    println!();

    Ok(())
}
