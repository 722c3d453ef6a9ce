//! Combined analyze operation: score a record, then attach an insight

use tracing::info;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::Result;
use crate::insights::InsightOrchestrator;
use crate::models::{ActivityRecord, AnalysisResult, InsightSource, ScoreResult};
use crate::scoring::ScoringEngine;

/// Result of one analysis plus where its insight came from
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub source: InsightSource,
}

impl Analysis {
    pub fn cache_hit(&self) -> bool {
        self.source == InsightSource::Cache
    }
}

/// Scoring engine and insight orchestrator behind one entry point
#[derive(Clone)]
pub struct Analyzer {
    engine: ScoringEngine,
    orchestrator: InsightOrchestrator,
}

impl Analyzer {
    pub fn new(engine: ScoringEngine, orchestrator: InsightOrchestrator) -> Self {
        Self {
            engine,
            orchestrator,
        }
    }

    pub fn from_config(config: &Config, cache: CacheStore) -> Result<Self> {
        Ok(Self::new(
            ScoringEngine::new(config.thresholds),
            InsightOrchestrator::from_config(config, cache)?,
        ))
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn orchestrator(&self) -> &InsightOrchestrator {
        &self.orchestrator
    }

    /// Validate and score a record without calling the generator
    pub fn score(&self, record: &ActivityRecord) -> Result<ScoreResult> {
        record.validate()?;
        Ok(self.engine.score(record))
    }

    /// Validate, score, and attach an insight
    ///
    /// Only validation can fail; cache and generator problems degrade the
    /// insight instead.
    pub async fn analyze(&self, record: &ActivityRecord) -> Result<Analysis> {
        let scored = self.score(record)?;

        let outcome = self
            .orchestrator
            .generate_insight(scored.score, &scored.tags, &scored.explanations)
            .await;
        let source = outcome.source();
        let (llm, _) = outcome.into_parts();

        info!(
            user_id = record.user_id.as_deref().unwrap_or("-"),
            score = scored.score,
            insight = source.as_str(),
            "Analysis complete"
        );

        Ok(Analysis {
            result: AnalysisResult {
                score: scored.score,
                tags: scored.tags,
                explanations: scored.explanations,
                llm,
            },
            source,
        })
    }
}
