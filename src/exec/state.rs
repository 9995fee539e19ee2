//! Run state and the final run result.
//!
//! [`ExecutionState`] is the orchestrator's private scratchpad: only the
//! essential-findings map survives across phases, and the whole thing is
//! consumed to produce the [`RunResult`] at run end.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::budget::Tier;
use crate::core::registry::WorkerResult;

use super::conflict::ConflictRecord;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    EarlyExited,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "Completed",
            RunStatus::EarlyExited => "EarlyExited",
            RunStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// Mutable state for one run. The orchestrator is the sole writer;
/// workers only ever return results.
#[derive(Debug, Default)]
pub struct ExecutionState {
    pub phase_index: usize,
    /// Cumulative budget usage, non-decreasing across phases.
    pub usage: u64,
    /// Essential findings keyed by worker name. The only state carried
    /// for the whole run.
    pub findings: BTreeMap<String, String>,
    /// Flags raised by any merged result.
    pub flags: BTreeSet<String>,
    pub resolved_conflicts: Vec<ConflictRecord>,
    /// Axes of conflicts that could not be resolved.
    pub unresolved_conflicts: Vec<String>,
    pub tier_reached: Tier,
    pub dropped_groups: Vec<String>,
    /// Human-readable progress lines, one per notable step.
    pub trace: Vec<String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self {
            tier_reached: Tier::Tier1,
            ..Default::default()
        }
    }

    /// Merge a result's essentials and flags; detailed payloads are
    /// dropped here, at the phase boundary.
    pub fn merge_result(&mut self, result: &WorkerResult) {
        self.findings
            .insert(result.worker.clone(), result.essential.clone());
        self.flags.extend(result.flags.iter().cloned());
    }

    /// Replace a worker's retained finding with a conflict resolution so
    /// the state never carries both raw sides of a settled disagreement.
    pub fn supersede_finding(&mut self, worker: &str, resolution_text: &str) {
        self.findings
            .insert(worker.to_string(), resolution_text.to_string());
    }

    pub fn push_trace(&mut self, line: impl Into<String>) {
        self.trace.push(line.into());
    }

    /// Fold the state into a final result.
    pub fn into_result(self, status: RunStatus, success: bool, failure: Option<String>) -> RunResult {
        RunResult {
            status,
            success,
            failure,
            findings: self.findings,
            trace: self.trace,
            tier_reached: self.tier_reached,
            resolved_conflicts: self.resolved_conflicts,
            unresolved_conflicts: self.unresolved_conflicts,
            dropped_groups: self.dropped_groups,
            usage: self.usage,
        }
    }
}

/// Everything the caller learns about a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// True when the run did not fail and the plan's success flag was
    /// raised.
    pub success: bool,
    /// Present when the run failed; names the worker and phase.
    pub failure: Option<String>,
    pub findings: BTreeMap<String, String>,
    pub trace: Vec<String>,
    pub tier_reached: Tier,
    pub resolved_conflicts: Vec<ConflictRecord>,
    pub unresolved_conflicts: Vec<String>,
    pub dropped_groups: Vec<String>,
    pub usage: u64,
}
