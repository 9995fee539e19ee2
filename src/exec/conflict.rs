//! Conflict detection and resolution across concurrently-produced
//! worker results.
//!
//! Two mechanisms live here and stay separate: the reactive path
//! (detect disagreement between results in a finished phase, then merge,
//! synthesize, or arbitrate) and the advisory path (challenge a not-yet-
//! frozen plan's tier choice and budget split). Both are deterministic;
//! resolving the same record twice yields identical output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::registry::{
    Recommendation, RecommendedAction, WorkerRegistry, WorkerResult,
};
use crate::plan::types::Plan;
use crate::{wlog_debug, Error, Result};

/// How the results in a record relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictClassification {
    Compatible,
    Contradictory,
}

/// How a conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    Merge,
    Synthesis,
    Arbitration,
}

/// One worker's stake in a conflict: its essential findings and the
/// recommendation that overlaps the shared axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub worker: String,
    pub essential: String,
    pub recommendation: Recommendation,
}

/// The settled outcome of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub method: ResolutionMethod,
    pub text: String,
    /// Workers whose recommendation was rejected by arbitration.
    pub rejected: Vec<String>,
}

/// Two or more results in tension over one recommendation axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub axis: String,
    /// Entries in deterministic worker-name order.
    pub entries: Vec<ConflictEntry>,
    pub classification: ConflictClassification,
    pub resolution: Option<Resolution>,
}

/// Classifies and settles disagreements between worker results, and
/// reviews high-cost plans before they freeze.
#[derive(Debug, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Scan a phase's results for axes addressed by more than one worker.
    /// Opposing actions on a shared axis produce one Contradictory record
    /// per axis; non-opposing overlap produces a Compatible record.
    pub fn detect(&self, results: &[WorkerResult]) -> Vec<ConflictRecord> {
        let mut by_axis: BTreeMap<String, Vec<ConflictEntry>> = BTreeMap::new();
        for result in results {
            for rec in &result.recommendations {
                by_axis.entry(rec.axis.clone()).or_default().push(ConflictEntry {
                    worker: result.worker.clone(),
                    essential: result.essential.clone(),
                    recommendation: rec.clone(),
                });
            }
        }

        let mut records = Vec::new();
        for (axis, mut entries) in by_axis {
            let distinct_workers = {
                let mut names: Vec<_> = entries.iter().map(|e| e.worker.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                names.len()
            };
            if distinct_workers < 2 {
                continue;
            }
            entries.sort_by(|a, b| a.worker.cmp(&b.worker));
            let contradictory = entries.iter().enumerate().any(|(i, a)| {
                entries[i + 1..]
                    .iter()
                    .any(|b| a.recommendation.action.opposes(&b.recommendation.action))
            });
            let classification = if contradictory {
                ConflictClassification::Contradictory
            } else {
                ConflictClassification::Compatible
            };
            wlog_debug!(
                "Conflict detected on axis '{}': {:?}, {} entries",
                axis,
                classification,
                entries.len()
            );
            records.push(ConflictRecord {
                axis,
                entries,
                classification,
                resolution: None,
            });
        }
        records
    }

    /// Settle a record. Compatible records merge; contradictory records
    /// get a staged synthesis when every entry carries a rationale, and
    /// otherwise fall back to arbitration by registry priority. Equal
    /// priorities with no synthesis available cannot be resolved.
    pub fn resolve(
        &self,
        record: &ConflictRecord,
        registry: &WorkerRegistry,
    ) -> Result<Resolution> {
        match record.classification {
            ConflictClassification::Compatible => Ok(self.merge(record)),
            ConflictClassification::Contradictory => {
                if record
                    .entries
                    .iter()
                    .all(|e| !e.recommendation.rationale.trim().is_empty())
                {
                    Ok(self.synthesize(record))
                } else {
                    self.arbitrate(record, registry)
                }
            }
        }
    }

    fn merge(&self, record: &ConflictRecord) -> Resolution {
        // Entries are already worker-name sorted.
        let text = record
            .entries
            .iter()
            .map(|e| format!("[{}] {}", e.worker, e.recommendation.rationale))
            .collect::<Vec<_>>()
            .join("\n");
        Resolution {
            method: ResolutionMethod::Merge,
            text,
            rejected: Vec::new(),
        }
    }

    /// A staged plan satisfying both constraints: the conservative action
    /// (decrease/disable/avoid) is staged first, the expansive one gated
    /// behind it.
    fn synthesize(&self, record: &ConflictRecord) -> Resolution {
        let conservative = |a: &RecommendedAction| {
            matches!(
                a,
                RecommendedAction::Decrease | RecommendedAction::Disable | RecommendedAction::Avoid
            )
        };
        let mut staged: Vec<&ConflictEntry> = record.entries.iter().collect();
        staged.sort_by_key(|e| {
            // Conservative first; worker name breaks ties.
            (!conservative(&e.recommendation.action), e.worker.clone())
        });
        let text = staged
            .iter()
            .enumerate()
            .map(|(i, e)| {
                format!(
                    "stage {}: {} {} ({}: {})",
                    i + 1,
                    e.recommendation.action.as_str(),
                    record.axis,
                    e.worker,
                    e.recommendation.rationale
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Resolution {
            method: ResolutionMethod::Synthesis,
            text,
            rejected: Vec::new(),
        }
    }

    fn arbitrate(&self, record: &ConflictRecord, registry: &WorkerRegistry) -> Result<Resolution> {
        let winner = record
            .entries
            .iter()
            .max_by_key(|e| registry.priority(&e.worker))
            .ok_or_else(|| Error::ConflictUnresolved {
                axis: record.axis.clone(),
            })?;
        let top_priority = registry.priority(&winner.worker);
        let tied = record
            .entries
            .iter()
            .filter(|e| registry.priority(&e.worker) == top_priority)
            .count();
        if tied > 1 {
            return Err(Error::ConflictUnresolved {
                axis: record.axis.clone(),
            });
        }
        let rejected = record
            .entries
            .iter()
            .filter(|e| e.worker != winner.worker)
            .map(|e| e.worker.clone())
            .collect();
        Ok(Resolution {
            method: ResolutionMethod::Arbitration,
            text: format!(
                "{} {} ({}: {})",
                winner.recommendation.action.as_str(),
                record.axis,
                winner.worker,
                winner.recommendation.rationale
            ),
            rejected,
        })
    }

    /// Challenge notes for a plan that has not frozen yet: tier versus
    /// budget mismatch, skewed per-phase split, specialist overload, and
    /// large unallocated slack. Purely deterministic; the validator
    /// records these in plan metadata.
    pub fn advisory_review(&self, plan: &Plan) -> Vec<String> {
        use crate::plan::complexity::MethodologyTier;

        let mut notes = Vec::new();
        if plan.methodology != MethodologyTier::Full && plan.budget.total > 10_000 {
            notes.push(format!(
                "tier '{}' with a {}-unit budget: consider whether the full methodology fits better",
                plan.methodology, plan.budget.total
            ));
        }
        let phase_sum = plan.budget.phase_sum();
        if let Some(max) = plan.budget.per_phase.iter().max() {
            if phase_sum > 0 && *max * 2 > phase_sum {
                notes.push(format!(
                    "budget split is skewed: one phase holds {} of {} allocated units",
                    max, phase_sum
                ));
            }
        }
        let specialists = plan
            .phases
            .iter()
            .flat_map(|p| &p.groups)
            .filter(|g| g.optional)
            .count();
        if specialists > 2 {
            notes.push(format!(
                "{} specialist groups scheduled: expect conflict pressure in synthesis",
                specialists
            ));
        }
        if plan.budget.total > 0 && (plan.budget.total - phase_sum) * 3 > plan.budget.total {
            notes.push(format!(
                "{} of {} total units are unallocated to any phase",
                plan.budget.total - phase_sum,
                plan.budget.total
            ));
        }
        notes
    }
}
