//! Worker contracts, invocation types, and the registry that binds a
//! worker name to an implementation.
//!
//! The registry is the engine's only way to reach domain logic: every
//! worker is looked up by its stable string name, and an unknown name
//! fails fast at validation instead of silently doing nothing.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::OnceLock;

use crate::util::truncate_bytes;
use crate::{Error, Result};

/// Byte cap on the essential findings retained from a worker result.
pub const ESSENTIAL_CAP_BYTES: usize = 4096;

/// The designated foundation worker; every plan's first phase is exactly
/// one invocation of it.
pub const FOUNDATION_WORKER: &str = "knowledge-discovery";

/// Declarative description of a worker: what it costs, how it behaves,
/// and how conflicts against it are arbitrated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerContract {
    pub name: String,
    pub description: String,
    /// Average cost of one invocation, in budget units.
    pub avg_cost: u64,
    /// Arbitration priority; higher wins when a contradiction cannot be
    /// synthesized.
    pub priority: u8,
    /// Whether a retried invocation can be assumed to behave identically.
    pub idempotent: bool,
}

/// Size-capped input payload handed to a worker. Workers never see the
/// full run history, only what the orchestrator curates for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssentialContext {
    pub task_description: String,
    /// Upstream essential findings relevant to this worker, keyed by the
    /// worker that produced them.
    pub upstream: BTreeMap<String, String>,
    /// Budget hint, in budget units, for the invocation.
    pub budget_hint: u64,
}

impl EssentialContext {
    pub fn new(task_description: impl Into<String>, budget_hint: u64) -> Self {
        Self {
            task_description: task_description.into(),
            upstream: BTreeMap::new(),
            budget_hint,
        }
    }

    /// Attach an upstream finding, capped to the essential size limit.
    pub fn with_upstream(mut self, worker: impl Into<String>, finding: &str) -> Self {
        self.upstream
            .insert(worker.into(), truncate_bytes(finding, ESSENTIAL_CAP_BYTES));
        self
    }
}

/// Terminal status of a worker invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Ok,
    Failed,
    Degraded,
}

/// Direction of a structured recommendation. Used to detect when two
/// workers pull the same axis in opposite directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Increase,
    Decrease,
    Enable,
    Disable,
    Adopt,
    Avoid,
}

impl RecommendedAction {
    /// Whether two actions on the same axis contradict each other.
    pub fn opposes(&self, other: &RecommendedAction) -> bool {
        matches!(
            (self, other),
            (RecommendedAction::Increase, RecommendedAction::Decrease)
                | (RecommendedAction::Decrease, RecommendedAction::Increase)
                | (RecommendedAction::Enable, RecommendedAction::Disable)
                | (RecommendedAction::Disable, RecommendedAction::Enable)
                | (RecommendedAction::Adopt, RecommendedAction::Avoid)
                | (RecommendedAction::Avoid, RecommendedAction::Adopt)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Increase => "increase",
            RecommendedAction::Decrease => "decrease",
            RecommendedAction::Enable => "enable",
            RecommendedAction::Disable => "disable",
            RecommendedAction::Adopt => "adopt",
            RecommendedAction::Avoid => "avoid",
        }
    }

    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "increase" | "raise" | "grow" => Some(RecommendedAction::Increase),
            "decrease" | "reduce" | "lower" | "shrink" => Some(RecommendedAction::Decrease),
            "enable" | "activate" => Some(RecommendedAction::Enable),
            "disable" | "deactivate" => Some(RecommendedAction::Disable),
            "adopt" | "use" | "prefer" => Some(RecommendedAction::Adopt),
            "avoid" | "drop" | "remove" => Some(RecommendedAction::Avoid),
            _ => None,
        }
    }
}

/// A structured recommendation extracted from a worker's findings:
/// an action applied to a named axis, with the original sentence kept
/// as rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub axis: String,
    pub action: RecommendedAction,
    pub rationale: String,
}

static RECOMMENDATION_RE: OnceLock<regex::Regex> = OnceLock::new();

impl Recommendation {
    pub fn new(
        axis: impl Into<String>,
        action: RecommendedAction,
        rationale: impl Into<String>,
    ) -> Self {
        let axis: String = axis.into();
        Self {
            axis: axis.to_lowercase(),
            action,
            rationale: rationale.into(),
        }
    }

    /// Parse free-text findings into structured recommendations. Looks
    /// for verb + object pairs like "increase cache-ttl" or "avoid
    /// session pinning"; lines without a recognized verb are skipped.
    pub fn parse_all(text: &str) -> Vec<Recommendation> {
        let re = RECOMMENDATION_RE.get_or_init(|| {
            regex::Regex::new(
                r"(?i)\b(increase|raise|grow|decrease|reduce|lower|shrink|enable|activate|disable|deactivate|adopt|prefer|avoid|drop|remove)\s+([a-z0-9][a-z0-9_\-]*)",
            )
            .unwrap()
        });
        let mut out = Vec::new();
        for line in text.lines() {
            for caps in re.captures_iter(line) {
                let verb = caps[1].to_lowercase();
                if let Some(action) = RecommendedAction::from_verb(&verb) {
                    out.push(Recommendation::new(
                        caps[2].to_lowercase(),
                        action,
                        line.trim().to_string(),
                    ));
                }
            }
        }
        out
    }
}

/// What a worker returns. Detailed payloads are ephemeral; only the
/// capped essential findings survive the phase boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker: String,
    pub status: WorkerStatus,
    /// Size-capped summary retained for the rest of the run.
    pub essential: String,
    /// Full output, dropped by the post-phase compaction hook.
    pub detailed: Option<String>,
    pub recommendations: Vec<Recommendation>,
    /// Flags raised by this result, e.g. "direct_pattern_match".
    pub flags: BTreeSet<String>,
    /// Budget units actually consumed.
    pub cost: u64,
}

impl WorkerResult {
    pub fn ok(worker: impl Into<String>, essential: &str, cost: u64) -> Self {
        Self {
            worker: worker.into(),
            status: WorkerStatus::Ok,
            essential: truncate_bytes(essential, ESSENTIAL_CAP_BYTES),
            detailed: None,
            recommendations: Vec::new(),
            flags: BTreeSet::new(),
            cost,
        }
    }

    pub fn failed(worker: impl Into<String>, reason: &str) -> Self {
        Self {
            worker: worker.into(),
            status: WorkerStatus::Failed,
            essential: truncate_bytes(reason, ESSENTIAL_CAP_BYTES),
            detailed: None,
            recommendations: Vec::new(),
            flags: BTreeSet::new(),
            cost: 0,
        }
    }

    pub fn with_detailed(mut self, detailed: impl Into<String>) -> Self {
        self.detailed = Some(detailed.into());
        self
    }

    pub fn with_recommendations(mut self, recs: Vec<Recommendation>) -> Self {
        self.recommendations = recs;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }
}

/// A worker implementation. Invocations are stateless: everything the
/// worker may use arrives in the context.
pub trait Worker: Send + Sync {
    fn invoke(&self, ctx: EssentialContext) -> BoxFuture<'static, WorkerResult>;
}

/// Adapts a closure into a [`Worker`].
pub struct FnWorker<F> {
    f: F,
}

impl<F> FnWorker<F>
where
    F: Fn(EssentialContext) -> BoxFuture<'static, WorkerResult> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Worker for FnWorker<F>
where
    F: Fn(EssentialContext) -> BoxFuture<'static, WorkerResult> + Send + Sync,
{
    fn invoke(&self, ctx: EssentialContext) -> BoxFuture<'static, WorkerResult> {
        (self.f)(ctx)
    }
}

/// Maps worker names to contracts and implementations.
#[derive(Default)]
pub struct WorkerRegistry {
    contracts: BTreeMap<String, WorkerContract>,
    workers: BTreeMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the standard contract roster but no
    /// implementations. Callers bind implementations per name.
    pub fn with_default_contracts() -> Self {
        let mut registry = Self::new();
        for contract in default_contracts() {
            registry.register_contract(contract);
        }
        registry
    }

    pub fn register_contract(&mut self, contract: WorkerContract) {
        self.contracts.insert(contract.name.clone(), contract);
    }

    pub fn register_worker(&mut self, name: impl Into<String>, worker: Arc<dyn Worker>) {
        self.workers.insert(name.into(), worker);
    }

    pub fn contract(&self, name: &str) -> Result<&WorkerContract> {
        self.contracts
            .get(name)
            .ok_or_else(|| Error::UnknownWorker(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    pub fn worker(&self, name: &str) -> Result<Arc<dyn Worker>> {
        self.workers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownWorker(name.to_string()))
    }

    /// Arbitration priority for a worker, defaulting to 0 when the
    /// contract is missing (conflict resolution never hard-fails on a
    /// lookup).
    pub fn priority(&self, name: &str) -> u8 {
        self.contracts.get(name).map(|c| c.priority).unwrap_or(0)
    }
}

/// The standard worker roster with declared costs and arbitration
/// priorities. Foundation discovery carries the highest priority since
/// its findings anchor everything downstream.
pub fn default_contracts() -> Vec<WorkerContract> {
    let entry = |name: &str, description: &str, avg_cost: u64, priority: u8| WorkerContract {
        name: name.to_string(),
        description: description.to_string(),
        avg_cost,
        priority,
        idempotent: true,
    };
    vec![
        entry(
            FOUNDATION_WORKER,
            "Queries existing knowledge and maps it to the task",
            1_000,
            10,
        ),
        entry("direct-answer", "Answers directly from a strong pattern match", 3_000, 5),
        entry("pattern-apply", "Applies known patterns to the task", 2_000, 6),
        entry("gap-analysis", "Identifies what existing knowledge does not cover", 2_000, 6),
        entry("doc-planning", "Plans documentation for novel findings", 2_000, 4),
        entry("enhanced-analysis", "Deep second-pass analysis of open questions", 4_000, 7),
        entry("cross-reference", "Cross-checks findings for consistency", 3_000, 8),
        entry("auth-performance", "Authentication performance analysis", 2_000, 5),
        entry("auth-security", "Authentication security analysis", 2_000, 7),
        entry("auth-optimization", "Authentication optimization proposals", 2_000, 4),
        entry("writing-analyst", "Prose structure and clarity analysis", 2_000, 5),
        entry("academic-analyst", "Citation and rigor analysis", 2_000, 5),
        entry("data-flow", "Traces data flow through the system", 2_000, 6),
        entry("svg-analyst", "Diagram and visualization analysis", 2_500, 4),
    ]
}
