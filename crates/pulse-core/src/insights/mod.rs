//! Insight orchestration
//!
//! Turns a scored day into a natural-language insight while keeping the
//! generator off the hot path:
//!
//! 1. Canonicalize the request (tags sorted lexically, explanations sorted by
//!    rule id) and build the cache key from it
//! 2. Serve a cached insight if one exists
//! 3. Otherwise call the generator under the retry policy, validating every
//!    reply, and write the first valid insight to the cache
//! 4. If every attempt fails, return a degraded insight that is never cached
//!
//! Concurrent misses for the same key are not coalesced: each caller runs its
//! own generation and the last cache write wins.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let orchestrator = InsightOrchestrator::from_config(&config, cache)?;
//! let outcome = orchestrator.generate_insight(score, &tags, &explanations).await;
//! let (insight, cache_hit) = outcome.into_parts();
//! ```

pub mod retry;

pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::ai::{parsing, GeneratorBackend, GeneratorClient};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{InsightResult, InsightSource, RuleExplanation, Tag};

/// Prefix of every insight cache key (before hashing)
pub const CACHE_KEY_PREFIX: &str = "llm:insight";

/// Summary carried by a degraded insight
pub const FALLBACK_SUMMARY: &str = "AI error occurred.";

/// Fixed instruction sent with every generation request
pub const SYSTEM_PROMPT: &str = "You are a productivity analysis expert. \
You receive a productivity score, tags and rule explanations and return a structured analysis. \
Reply with a single JSON object with the fields \"summary\" (a brief insight), \
\"recommendations\" (a list of strings) and \"key_points\" (a list of strings). \
Return only the JSON object.";

/// Default per-attempt time limit when none is configured
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(25);

/// How an insight was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum InsightOutcome {
    /// Served from the cache; the generator was not called
    Cached(InsightResult),
    /// Freshly generated and written to the cache
    Fresh(InsightResult),
    /// Generation failed; a fallback insight that was not cached
    Degraded { insight: InsightResult, reason: String },
}

impl InsightOutcome {
    pub fn insight(&self) -> &InsightResult {
        match self {
            InsightOutcome::Cached(insight) | InsightOutcome::Fresh(insight) => insight,
            InsightOutcome::Degraded { insight, .. } => insight,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, InsightOutcome::Cached(_))
    }

    pub fn source(&self) -> InsightSource {
        match self {
            InsightOutcome::Cached(_) => InsightSource::Cache,
            InsightOutcome::Fresh(_) => InsightSource::Generated,
            InsightOutcome::Degraded { .. } => InsightSource::Fallback,
        }
    }

    /// Split into the insight and whether it was a cache hit
    pub fn into_parts(self) -> (InsightResult, bool) {
        let hit = self.is_cache_hit();
        let insight = match self {
            InsightOutcome::Cached(insight) | InsightOutcome::Fresh(insight) => insight,
            InsightOutcome::Degraded { insight, .. } => insight,
        };
        (insight, hit)
    }
}

/// Build the degraded insight for a failed generation
pub fn fallback_insight(reason: &str) -> InsightResult {
    InsightResult {
        summary: FALLBACK_SUMMARY.to_string(),
        recommendations: vec![format!("Error: {}", reason)],
        key_points: Vec::new(),
    }
}

/// Tags and explanations in canonical order
struct Canonical<'a> {
    tags: Vec<&'static str>,
    explanations: Vec<&'a RuleExplanation>,
}

impl<'a> Canonical<'a> {
    fn new(tags: &[Tag], explanations: &'a [RuleExplanation]) -> Self {
        let mut tags: Vec<&'static str> = tags.iter().map(Tag::as_str).collect();
        tags.sort_unstable();

        let mut explanations: Vec<&RuleExplanation> = explanations.iter().collect();
        // Stable, so repeated rule ids keep their relative order
        explanations.sort_by_key(|e| e.rule_id.as_str());

        Self { tags, explanations }
    }

    fn explanations_json(&self) -> Value {
        Value::Array(
            self.explanations
                .iter()
                .map(|e| {
                    json!({
                        "rule_id": e.rule_id.as_str(),
                        "description": e.description,
                        "effect_on_score": e.effect_on_score,
                    })
                })
                .collect(),
        )
    }
}

/// Build the cache key for a (score, tags, explanations) triple
///
/// Input order does not matter: permutations of the same tags and
/// explanations produce the same key.
pub fn build_cache_key(score: f64, tags: &[Tag], explanations: &[RuleExplanation]) -> String {
    let canonical = Canonical::new(tags, explanations);
    format!(
        "{}:{}:{}:{}",
        CACHE_KEY_PREFIX,
        score,
        json!(canonical.tags),
        canonical.explanations_json()
    )
}

/// Render the user prompt for a (score, tags, explanations) triple
pub fn render_prompt(score: f64, tags: &[Tag], explanations: &[RuleExplanation]) -> String {
    let canonical = Canonical::new(tags, explanations);

    let tags_line = if canonical.tags.is_empty() {
        "none".to_string()
    } else {
        canonical.tags.join(", ")
    };

    let mut prompt = format!("Score: {:.1}\nTags: {}\nExplanations:\n", score, tags_line);
    for e in &canonical.explanations {
        prompt.push_str(&format!(
            "- {} ({:+.2}): {}\n",
            e.rule_id, e.effect_on_score, e.description
        ));
    }
    prompt
}

/// Cache-fronted, retrying insight generator
#[derive(Clone)]
pub struct InsightOrchestrator {
    generator: GeneratorClient,
    cache: CacheStore,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl InsightOrchestrator {
    pub fn new(generator: GeneratorClient, cache: CacheStore, retry: RetryPolicy) -> Self {
        Self {
            generator,
            cache,
            retry,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Build the production orchestrator from configuration
    pub fn from_config(config: &Config, cache: CacheStore) -> Result<Self> {
        let generator = GeneratorClient::from_config(&config.generator)?;
        Ok(Self::new(generator, cache, RetryPolicy::from_config(&config.retry))
            .with_attempt_timeout(Duration::from_secs(config.generator.timeout_secs)))
    }

    /// Limit each generator attempt to `timeout`
    pub fn with_attempt_timeout(self, timeout: Duration) -> Self {
        Self {
            attempt_timeout: timeout,
            ..self
        }
    }

    pub fn generator(&self) -> &GeneratorClient {
        &self.generator
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Return an insight for the triple, from cache or the generator
    ///
    /// Never fails: generator errors end in [`InsightOutcome::Degraded`] and
    /// cache errors count as misses.
    pub async fn generate_insight(
        &self,
        score: f64,
        tags: &[Tag],
        explanations: &[RuleExplanation],
    ) -> InsightOutcome {
        let key = build_cache_key(score, tags, explanations);

        if let Some(insight) = self.cache.get::<InsightResult>(&key).await {
            debug!(score, "Insight served from cache");
            return InsightOutcome::Cached(insight);
        }

        let prompt = render_prompt(score, tags, explanations);

        match self.generate(&prompt).await {
            Ok(insight) => {
                self.cache.set(&key, &insight, None).await;
                info!(score, model = self.generator.model(), "Generated fresh insight");
                InsightOutcome::Fresh(insight)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(score, error = %reason, "Insight generation failed, returning fallback");
                InsightOutcome::Degraded {
                    insight: fallback_insight(&reason),
                    reason,
                }
            }
        }
    }

    /// Run the generator under the retry policy and validate its reply
    async fn generate(&self, prompt: &str) -> Result<InsightResult> {
        self.retry
            .run(|attempt| async move {
                debug!(attempt, model = self.generator.model(), "Requesting insight");
                let reply = tokio::time::timeout(
                    self.attempt_timeout,
                    self.generator.complete(SYSTEM_PROMPT, prompt),
                )
                .await
                .map_err(|_| Error::Timeout(self.attempt_timeout))??;

                parsing::parse_insight(&reply)
            })
            .await
    }
}
