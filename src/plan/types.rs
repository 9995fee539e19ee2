//! Plan structure: phases, parallel groups, budgets, and the exit and
//! success predicates attached to a plan.
//!
//! A [`Plan`] serializes to the engine's externally-inspectable plan
//! document (`methodology_type`, `phases[]`, `budget`, early-exit
//! conditions, success criteria). Freezing is structural: the validator
//! is the only module that can mint a [`FrozenPlan`], and the
//! orchestrator accepts nothing else.

use serde::{Deserialize, Serialize};

use super::complexity::MethodologyTier;

/// Flag raised by a worker when existing knowledge already answers the
/// task outright.
pub const FLAG_DIRECT_PATTERN_MATCH: &str = "direct_pattern_match";

/// Flag set by the orchestrator when a run reaches its final phase.
pub const FLAG_RUN_COMPLETE: &str = "run_complete";

/// One worker invocation inside a parallel group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInvocation {
    pub worker: String,
    /// Budget units suggested to the worker for this invocation.
    pub budget_hint: u64,
}

impl WorkerInvocation {
    pub fn new(worker: impl Into<String>, budget_hint: u64) -> Self {
        Self {
            worker: worker.into(),
            budget_hint,
        }
    }
}

/// A set of invocations with no inter-dependency, safe to run
/// concurrently. Optional groups are the first thing shed under budget
/// pressure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelGroup {
    pub name: String,
    pub invocations: Vec<WorkerInvocation>,
    /// Specialist groups injected from domain tags are optional; template
    /// groups are not.
    pub optional: bool,
}

impl ParallelGroup {
    pub fn new(name: impl Into<String>, invocations: Vec<WorkerInvocation>) -> Self {
        Self {
            name: name.into(),
            invocations,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.worker.as_str()).collect()
    }
}

/// A barrier-synchronized stage: every group must finish before the next
/// phase starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    #[serde(rename = "parallel_groups")]
    pub groups: Vec<ParallelGroup>,
}

impl Phase {
    pub fn new(name: impl Into<String>, groups: Vec<ParallelGroup>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.groups.iter().flat_map(|g| g.worker_names()).collect()
    }
}

/// Total and per-phase budget allocations in budget units.
/// `per_phase[i]` corresponds to `phases[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub total: u64,
    pub per_phase: Vec<u64>,
}

impl Budget {
    pub fn phase_sum(&self) -> u64 {
        self.per_phase.iter().sum()
    }
}

/// Predicate evaluated at phase boundaries; when satisfied the run
/// transitions to EarlyExited and skips remaining phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EarlyExitCondition {
    /// Exit once a result has raised the named flag, checked after the
    /// given phase index.
    FlagSet { flag: String, after_phase: usize },
    /// Exit once any retained finding contains the needle.
    FindingContains { needle: String, after_phase: usize },
}

/// What "done, successfully" means for the run: a description for humans
/// and a flag the orchestrator checks mechanically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub description: String,
    pub flag: String,
}

impl SuccessCriterion {
    pub fn new(description: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            flag: flag.into(),
        }
    }
}

/// Audit trail attached to a plan as it is built and validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Specialist groups dropped by the budget tie-break, by group name.
    pub dropped_groups: Vec<String>,
    /// Advisory challenge notes recorded during validation.
    pub advisory_notes: Vec<String>,
    /// Rebalancing revisions applied by the validator.
    pub revisions: u32,
}

/// An execution plan before validation. Built once by the plan builder,
/// possibly amended a bounded number of times by the validator, then
/// frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "methodology_type")]
    pub methodology: MethodologyTier,
    pub phases: Vec<Phase>,
    pub budget: Budget,
    #[serde(rename = "early_exit_conditions")]
    pub early_exit: Vec<EarlyExitCondition>,
    #[serde(rename = "success_criteria")]
    pub success: SuccessCriterion,
    pub metadata: PlanMetadata,
}

impl Plan {
    pub fn phase_budget(&self, index: usize) -> u64 {
        self.budget.per_phase.get(index).copied().unwrap_or(0)
    }

    /// Every worker name referenced anywhere in the plan.
    pub fn worker_names(&self) -> Vec<&str> {
        self.phases.iter().flat_map(|p| p.worker_names()).collect()
    }

    /// Serialized plan document for audit and debugging.
    pub fn to_document(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A plan that has passed validation. Only the validator can construct
/// one; the orchestrator accepts nothing less.
#[derive(Debug, Clone)]
pub struct FrozenPlan(pub(crate) Plan);

impl FrozenPlan {
    pub fn plan(&self) -> &Plan {
        &self.0
    }

    pub fn into_plan(self) -> Plan {
        self.0
    }
}
