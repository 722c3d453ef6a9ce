//! Productivity scoring engine
//!
//! Maps one [`ActivityRecord`] to a score, a set of tags, and one
//! [`RuleExplanation`] per evaluated rule. Scoring is pure: no I/O, no shared
//! state, safe to call from any number of tasks at once.
//!
//! Every rule starts from the same base score and contributes an independent
//! delta:
//!
//! | Rule              | Delta                                                  |
//! |-------------------|--------------------------------------------------------|
//! | `task_completion` | `(rate - 0.7) * 20`, rate is 1.0 with no tasks         |
//! | `deep_work`       | `min(15, over/10)` at or above target, `-under/10` below |
//! | `meetings`        | `-max(0, (minutes - max)/30) * 5`                      |
//! | `interruptions`   | `-min(15, count/max * 10)`                             |
//! | `sleep`           | `-under * 3` below target, `min(6, over * 1.5)` above  |
//! | `breaks`          | `min(5, minutes/30)`                                   |
//! | `mood`            | `(mood - 5) * 1.5`, only when mood is reported         |
//!
//! Tags are derived from the raw metrics and the final score, never from the
//! individual deltas.

use tracing::debug;

use crate::config::RuleThresholds;
use crate::models::{ActivityRecord, RuleExplanation, RuleId, ScoreResult, Tag};

/// Score every record starts from
pub const BASE_SCORE: f64 = 50.0;

/// Lowest possible score
pub const MIN_SCORE: f64 = 0.0;

/// Highest possible score
pub const MAX_SCORE: f64 = 100.0;

/// Completion rate that neither adds nor removes points
const BASELINE_COMPLETION_RATE: f64 = 0.7;

const MAX_DEEP_WORK_BONUS: f64 = 15.0;
const MAX_INTERRUPTION_PENALTY: f64 = 15.0;
const MAX_SLEEP_BONUS: f64 = 6.0;
const MAX_BREAK_BONUS: f64 = 5.0;

/// Scoring engine bound to a set of thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    thresholds: RuleThresholds,
}

impl ScoringEngine {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Score a record
    pub fn score(&self, record: &ActivityRecord) -> ScoreResult {
        compute_productivity(record, &self.thresholds)
    }
}

/// Score a record against the given thresholds
pub fn compute_productivity(record: &ActivityRecord, thresholds: &RuleThresholds) -> ScoreResult {
    let completion_rate = completion_rate(record);

    let mut explanations = vec![
        task_completion_rule(record, completion_rate),
        deep_work_rule(record.deep_work_minutes, thresholds.target_deep_work_minutes),
        meetings_rule(record.meetings_minutes, thresholds.max_meeting_minutes),
        interruptions_rule(record.interruptions, thresholds.max_interruptions),
        sleep_rule(record.sleep_hours, thresholds.target_sleep_hours),
        breaks_rule(record.breaks_minutes),
    ];
    if let Some(mood) = record.mood {
        explanations.push(mood_rule(mood));
    }

    let raw = explanations
        .iter()
        .fold(BASE_SCORE, |acc, e| acc + e.effect_on_score);
    let score = raw.clamp(MIN_SCORE, MAX_SCORE);

    let tags = derive_tags(record, completion_rate, score, thresholds);

    debug!(
        raw_score = raw,
        score,
        rules = explanations.len(),
        tags = tags.len(),
        "Computed productivity score"
    );

    ScoreResult {
        score,
        tags,
        explanations,
    }
}

/// Share of tasks completed; an empty task list counts as fully complete
fn completion_rate(record: &ActivityRecord) -> f64 {
    if record.tasks.is_empty() {
        1.0
    } else {
        record.completed_tasks() as f64 / record.tasks.len() as f64
    }
}

fn task_completion_rule(record: &ActivityRecord, rate: f64) -> RuleExplanation {
    RuleExplanation {
        rule_id: RuleId::TaskCompletion,
        description: format!(
            "Completion rate {}/{} = {:.2}",
            record.completed_tasks(),
            record.tasks.len(),
            rate
        ),
        effect_on_score: (rate - BASELINE_COMPLETION_RATE) * 20.0,
    }
}

fn deep_work_rule(minutes: u32, target: f64) -> RuleExplanation {
    let minutes_f = f64::from(minutes);
    let effect = if minutes_f >= target {
        ((minutes_f - target) / 10.0).min(MAX_DEEP_WORK_BONUS)
    } else {
        -(target - minutes_f) / 10.0
    };

    RuleExplanation {
        rule_id: RuleId::DeepWork,
        description: format!("Deep work {} minutes (target {})", minutes, target),
        effect_on_score: effect,
    }
}

fn meetings_rule(minutes: u32, max_healthy: f64) -> RuleExplanation {
    let overage_blocks = ((f64::from(minutes) - max_healthy) / 30.0).max(0.0);
    let penalty = overage_blocks * 5.0;

    RuleExplanation {
        rule_id: RuleId::Meetings,
        description: format!("Meetings {} minutes (max healthy {})", minutes, max_healthy),
        effect_on_score: if penalty > 0.0 { -penalty } else { 0.0 },
    }
}

fn interruptions_rule(count: u32, max_healthy: f64) -> RuleExplanation {
    let penalty = if max_healthy > 0.0 {
        (f64::from(count) / max_healthy * 10.0).min(MAX_INTERRUPTION_PENALTY)
    } else if count > 0 {
        // No interruptions are healthy: any interruption costs the full penalty
        MAX_INTERRUPTION_PENALTY
    } else {
        0.0
    };

    RuleExplanation {
        rule_id: RuleId::Interruptions,
        description: format!("Interruptions {} (max healthy {})", count, max_healthy),
        effect_on_score: if penalty > 0.0 { -penalty } else { 0.0 },
    }
}

fn sleep_rule(hours: f64, target: f64) -> RuleExplanation {
    let effect = if hours < target {
        -(target - hours) * 3.0
    } else {
        ((hours - target) * 1.5).min(MAX_SLEEP_BONUS)
    };

    RuleExplanation {
        rule_id: RuleId::Sleep,
        description: format!("Sleep {} hours (target {})", hours, target),
        effect_on_score: effect,
    }
}

fn breaks_rule(minutes: u32) -> RuleExplanation {
    RuleExplanation {
        rule_id: RuleId::Breaks,
        description: format!("Breaks {} minutes", minutes),
        effect_on_score: (f64::from(minutes) / 30.0).min(MAX_BREAK_BONUS),
    }
}

fn mood_rule(mood: u8) -> RuleExplanation {
    RuleExplanation {
        rule_id: RuleId::Mood,
        description: format!("Mood rating {} (1-10)", mood),
        effect_on_score: (f64::from(mood) - 5.0) * 1.5,
    }
}

fn derive_tags(
    record: &ActivityRecord,
    completion_rate: f64,
    score: f64,
    thresholds: &RuleThresholds,
) -> Vec<Tag> {
    let interruptions = f64::from(record.interruptions);
    let deep_work = f64::from(record.deep_work_minutes);
    let mut tags = Vec::new();

    if interruptions > thresholds.max_interruptions * 0.8 {
        tags.push(Tag::Distracted);
    }
    if record.sleep_hours < thresholds.target_sleep_hours - 1.5 {
        tags.push(Tag::BurnoutRisk);
    }
    if deep_work >= thresholds.target_deep_work_minutes
        && completion_rate >= 0.8
        && interruptions < thresholds.max_interruptions * 0.4
    {
        tags.push(Tag::Focused);
    }
    if (40.0..=70.0).contains(&score) {
        tags.push(Tag::NeedsImprovement);
    }
    if score > 80.0 {
        tags.push(Tag::WellBalanced);
    }

    tags
}
