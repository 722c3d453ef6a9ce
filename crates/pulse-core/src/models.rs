//! Data models for Pulse

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A single planned task for the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub planned_minutes: u32,
    #[serde(default)]
    pub actual_minutes: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub category: Option<String>,
}

/// One day of activity for a single person
///
/// Supplied per request and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityRecord {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub date_range: Option<String>,
    pub tasks: Vec<Task>,
    pub deep_work_minutes: u32,
    pub meetings_minutes: u32,
    pub interruptions: u32,
    pub sleep_hours: f64,
    pub breaks_minutes: u32,
    /// Self-reported mood, 1-10
    #[serde(default)]
    pub mood: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ActivityRecord {
    /// Check value ranges the type system does not cover
    pub fn validate(&self) -> Result<()> {
        if !self.sleep_hours.is_finite() || !(0.0..=24.0).contains(&self.sleep_hours) {
            return Err(Error::InvalidData(format!(
                "sleep_hours must be between 0 and 24, got {}",
                self.sleep_hours
            )));
        }
        if let Some(mood) = self.mood {
            if !(1..=10).contains(&mood) {
                return Err(Error::InvalidData(format!(
                    "mood must be between 1 and 10, got {}",
                    mood
                )));
            }
        }
        if let Some(task) = self.tasks.iter().find(|t| t.id.trim().is_empty()) {
            return Err(Error::InvalidData(format!(
                "task '{}' has an empty id",
                task.title
            )));
        }
        Ok(())
    }

    /// Number of completed tasks
    pub fn completed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }
}

/// Scoring rules, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    TaskCompletion,
    DeepWork,
    Meetings,
    Interruptions,
    Sleep,
    Breaks,
    Mood,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::TaskCompletion => "task_completion",
            RuleId::DeepWork => "deep_work",
            RuleId::Meetings => "meetings",
            RuleId::Interruptions => "interruptions",
            RuleId::Sleep => "sleep",
            RuleId::Breaks => "breaks",
            RuleId::Mood => "mood",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "task_completion" => Ok(RuleId::TaskCompletion),
            "deep_work" => Ok(RuleId::DeepWork),
            "meetings" => Ok(RuleId::Meetings),
            "interruptions" => Ok(RuleId::Interruptions),
            "sleep" => Ok(RuleId::Sleep),
            "breaks" => Ok(RuleId::Breaks),
            "mood" => Ok(RuleId::Mood),
            _ => Err(format!("Unknown rule: {}", s)),
        }
    }
}

/// Audit entry for one rule evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleExplanation {
    pub rule_id: RuleId,
    pub description: String,
    /// Signed change this rule applied to the score
    pub effect_on_score: f64,
}

/// Descriptive tags derived from raw metrics and the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Interruptions above 80% of the healthy maximum
    Distracted,
    /// Sleep more than 1.5 hours under target
    BurnoutRisk,
    /// Deep work on target, most tasks done, few interruptions
    Focused,
    /// Score between 40 and 70
    NeedsImprovement,
    /// Score above 80
    WellBalanced,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Distracted => "Distracted",
            Tag::BurnoutRisk => "BurnoutRisk",
            Tag::Focused => "Focused",
            Tag::NeedsImprovement => "NeedsImprovement",
            Tag::WellBalanced => "WellBalanced",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of the scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Final score, clamped into [0, 100]
    pub score: f64,
    pub tags: Vec<Tag>,
    /// One entry per evaluated rule, in evaluation order
    pub explanations: Vec<RuleExplanation>,
}

/// Natural-language insight attached to a score
///
/// Fresh and degraded insights share this shape; the orchestrator's
/// outcome says which one it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResult {
    #[serde(alias = "insight")]
    pub summary: String,
    pub recommendations: Vec<String>,
    pub key_points: Vec<String>,
}

/// Where an insight came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    /// Served from the insight cache
    Cache,
    /// Freshly generated and written to the cache
    Generated,
    /// Local fallback after generation failed
    Fallback,
}

impl InsightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightSource::Cache => "cache",
            InsightSource::Generated => "generated",
            InsightSource::Fallback => "fallback",
        }
    }
}

/// Combined response of the analyze operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: f64,
    pub tags: Vec<Tag>,
    pub explanations: Vec<RuleExplanation>,
    pub llm: InsightResult,
}
