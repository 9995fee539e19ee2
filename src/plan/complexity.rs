//! Task complexity scoring.
//!
//! The assessor compares a task's sub-topics against a bounded knowledge
//! summary and maps the resulting coverage, gap, and declared difficulty
//! to a methodology tier. Unknown input never fails; it degrades to the
//! full methodology with low confidence.

use serde::{Deserialize, Serialize};

use crate::core::task::{Difficulty, Task};
use crate::knowledge::BoundedSummary;
use crate::wlog_debug;
use crate::{Error, Result};

/// How much methodology a task gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodologyTier {
    Light,
    Medium,
    Full,
}

impl std::fmt::Display for MethodologyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MethodologyTier::Light => "light",
            MethodologyTier::Medium => "medium",
            MethodologyTier::Full => "full",
        };
        write!(f, "{}", s)
    }
}

/// Output of the assessor. Produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Fraction of task sub-topics matched in the knowledge summary.
    pub coverage: f64,
    pub gap: f64,
    pub difficulty: Difficulty,
    pub tier: MethodologyTier,
    /// Lower near the coverage thresholds, where the tier choice is least
    /// certain.
    pub confidence: f64,
}

const LOW_COVERAGE: f64 = 0.4;
const HIGH_COVERAGE: f64 = 0.8;

/// Scores tasks against prior knowledge and picks a methodology tier.
#[derive(Debug, Default)]
pub struct ComplexityAssessor;

impl ComplexityAssessor {
    pub fn new() -> Self {
        Self
    }

    /// Assess a task given an optional knowledge summary. An absent or
    /// empty summary is treated as zero coverage: full methodology with
    /// capped confidence.
    pub fn assess(&self, task: &Task, summary: Option<&BoundedSummary>) -> Result<ComplexityScore> {
        if task.description.trim().is_empty() {
            return Err(Error::InsufficientInput);
        }

        let sub_topics = task.sub_topics();
        let coverage = match summary {
            Some(s) if !s.is_empty() && !sub_topics.is_empty() => {
                let matched = sub_topics
                    .iter()
                    .filter(|t| s.matched_topics.contains(*t) || s.text.to_lowercase().contains(*t))
                    .count();
                matched as f64 / sub_topics.len() as f64
            }
            _ => 0.0,
        };
        let gap = 1.0 - coverage;

        let tier = if coverage > HIGH_COVERAGE && task.difficulty == Difficulty::Low {
            MethodologyTier::Light
        } else if coverage < LOW_COVERAGE || task.difficulty == Difficulty::High {
            MethodologyTier::Full
        } else {
            MethodologyTier::Medium
        };

        let confidence = if summary.map(|s| s.is_empty()).unwrap_or(true) {
            0.5
        } else {
            Self::confidence_for(coverage)
        };

        wlog_debug!(
            "Assessed task {}: coverage={:.2}, difficulty={}, tier={}, confidence={:.2}",
            task.id.short(),
            coverage,
            task.difficulty,
            tier,
            confidence
        );

        Ok(ComplexityScore {
            coverage,
            gap,
            difficulty: task.difficulty,
            tier,
            confidence,
        })
    }

    /// Confidence climbs from 0.5 at a threshold boundary to 0.95 once
    /// coverage is at least 0.2 away from both boundaries.
    fn confidence_for(coverage: f64) -> f64 {
        let d = (coverage - LOW_COVERAGE)
            .abs()
            .min((coverage - HIGH_COVERAGE).abs());
        0.5 + 0.45 * (d.min(0.2) / 0.2)
    }
}
