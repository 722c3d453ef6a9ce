//! Analyze command implementation

use std::path::Path;

use anyhow::Result;
use pulse_core::{Analysis, Analyzer, CacheStore, Config, InsightSource};
use tracing::debug;

use super::{load_record, print_score};

/// Score the record in `path` and attach an insight, using the configured
/// cache and generator
pub async fn analyze_file(config: &Config, path: &Path) -> Result<Analysis> {
    let record = load_record(path)?;
    let cache = CacheStore::from_config(&config.cache)?;
    let analyzer = Analyzer::from_config(config, cache.clone())?;

    let analysis = analyzer.analyze(&record).await;
    cache.close().await;
    let analysis = analysis?;

    debug!(source = analysis.source.as_str(), "Analysis complete");
    Ok(analysis)
}

pub async fn cmd_analyze(config: &Config, path: &Path, json: bool) -> Result<()> {
    let analysis = analyze_file(config, path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.result)?);
        return Ok(());
    }

    let result = &analysis.result;
    println!();
    println!("📊 Productivity Analysis");
    println!("   ─────────────────────────────────────────────────────────────");
    print_score(result.score, &result.tags, &result.explanations);
    println!();

    match analysis.source {
        InsightSource::Cache => println!("💡 Insight (cached)"),
        InsightSource::Generated => println!("💡 Insight ({})", config.generator.model),
        InsightSource::Fallback => println!("⚠️  Insight unavailable"),
    }
    println!("   {}", result.llm.summary);

    if !result.llm.key_points.is_empty() {
        println!();
        println!("   Key points:");
        for point in &result.llm.key_points {
            println!("   • {}", point);
        }
    }
    if !result.llm.recommendations.is_empty() {
        println!();
        println!("   Recommendations:");
        for rec in &result.llm.recommendations {
            println!("   • {}", rec);
        }
    }
    println!();

    Ok(())
}
