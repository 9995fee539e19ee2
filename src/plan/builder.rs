//! Expands a methodology tier and detected domain tags into a concrete,
//! unfrozen [`Plan`].
//!
//! Each tier has a template skeleton; specialist groups matching the
//! task's domain tags are injected into the first post-foundation phase
//! as optional groups. When the injected total exceeds the configured
//! ceiling, the weakest-matching, most-expensive groups are dropped and
//! the drop is recorded in plan metadata.

use crate::config::EngineConfig;
use crate::core::registry::FOUNDATION_WORKER;
use crate::core::task::Task;
use crate::{wlog, wlog_debug};

use super::complexity::{ComplexityScore, MethodologyTier};
use super::types::{
    Budget, EarlyExitCondition, ParallelGroup, Phase, Plan, PlanMetadata, SuccessCriterion,
    WorkerInvocation, FLAG_DIRECT_PATTERN_MATCH, FLAG_RUN_COMPLETE,
};

/// Specialist groups keyed by the domain tag that triggers them.
/// (tag, group name, members with budget hints)
fn specialist_groups() -> Vec<(&'static str, &'static str, Vec<(&'static str, u64)>)> {
    vec![
        (
            "authentication",
            "authentication",
            vec![
                ("auth-performance", 2_000),
                ("auth-security", 2_000),
                ("auth-optimization", 2_000),
            ],
        ),
        (
            "writing",
            "writing",
            vec![("writing-analyst", 2_000), ("academic-analyst", 2_000)],
        ),
        ("data-flow", "data-flow", vec![("data-flow", 2_000)]),
        ("visualization", "visualization", vec![("svg-analyst", 2_500)]),
    ]
}

/// Builds plans from complexity scores and domain tags.
pub struct PlanBuilder {
    config: EngineConfig,
}

impl PlanBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Build an unfrozen plan for the scored task.
    pub fn build(&self, score: &ComplexityScore, task: &Task) -> Plan {
        let mut plan = self.template(score.tier);
        self.inject_specialists(&mut plan, task);
        wlog!(
            "Plan built for task {}: tier={}, phases={}, total_budget={}",
            task.id.short(),
            score.tier,
            plan.phases.len(),
            plan.budget.total
        );
        plan
    }

    /// The safety-net plan: full template, no specialists. Always
    /// validates.
    pub fn fallback(&self) -> Plan {
        self.template(MethodologyTier::Full)
    }

    fn template(&self, tier: MethodologyTier) -> Plan {
        let foundation = |hint: u64| {
            Phase::new(
                "foundation",
                vec![ParallelGroup::new(
                    "foundation",
                    vec![WorkerInvocation::new(FOUNDATION_WORKER, hint)],
                )],
            )
        };
        let success = SuccessCriterion::new("every scheduled phase completed", FLAG_RUN_COMPLETE);
        let pattern_exit = EarlyExitCondition::FlagSet {
            flag: FLAG_DIRECT_PATTERN_MATCH.to_string(),
            after_phase: 0,
        };

        match tier {
            MethodologyTier::Light => Plan {
                methodology: tier,
                phases: vec![
                    foundation(1_000),
                    Phase::new(
                        "direct-answer",
                        vec![ParallelGroup::new(
                            "direct-answer",
                            vec![WorkerInvocation::new("direct-answer", 3_000)],
                        )],
                    ),
                ],
                budget: Budget {
                    total: 4_000,
                    per_phase: vec![1_000, 3_000],
                },
                early_exit: vec![pattern_exit],
                success,
                metadata: PlanMetadata::default(),
            },
            MethodologyTier::Medium => Plan {
                methodology: tier,
                phases: vec![
                    foundation(1_500),
                    Phase::new(
                        "analysis",
                        vec![ParallelGroup::new(
                            "analysis",
                            vec![
                                WorkerInvocation::new("pattern-apply", 2_000),
                                WorkerInvocation::new("gap-analysis", 2_000),
                            ],
                        )],
                    ),
                    Phase::new(
                        "synthesis",
                        vec![ParallelGroup::new(
                            "synthesis",
                            vec![WorkerInvocation::new("cross-reference", 2_500)],
                        )],
                    ),
                ],
                budget: Budget {
                    total: 8_000,
                    per_phase: vec![1_500, 4_000, 2_500],
                },
                early_exit: vec![pattern_exit],
                success,
                metadata: PlanMetadata::default(),
            },
            MethodologyTier::Full => Plan {
                methodology: tier,
                phases: vec![
                    foundation(2_000),
                    Phase::new(
                        "analysis",
                        vec![ParallelGroup::new(
                            "analysis",
                            vec![
                                WorkerInvocation::new("pattern-apply", 2_000),
                                WorkerInvocation::new("gap-analysis", 2_000),
                                WorkerInvocation::new("doc-planning", 2_000),
                            ],
                        )],
                    ),
                    Phase::new(
                        "enhanced",
                        vec![ParallelGroup::new(
                            "enhanced",
                            vec![WorkerInvocation::new("enhanced-analysis", 4_000)],
                        )],
                    ),
                    Phase::new(
                        "cross-reference",
                        vec![ParallelGroup::new(
                            "cross-reference",
                            vec![WorkerInvocation::new("cross-reference", 3_000)],
                        )],
                    ),
                ],
                budget: Budget {
                    total: 15_000,
                    per_phase: vec![2_000, 6_000, 4_000, 3_000],
                },
                early_exit: Vec::new(),
                success,
                metadata: PlanMetadata::default(),
            },
        }
    }

    /// Inject one optional ParallelGroup per matching domain tag into the
    /// first post-foundation phase, then shed the weakest matches until
    /// the plan fits under the specialist budget ceiling.
    fn inject_specialists(&self, plan: &mut Plan, task: &Task) {
        if plan.phases.len() < 2 {
            return;
        }
        let description = task.description.to_lowercase();

        // (strength desc, cost asc) ordering; drops come off the tail.
        let mut candidates: Vec<(f64, u64, &'static str, Vec<(&'static str, u64)>)> =
            specialist_groups()
                .into_iter()
                .filter(|(tag, _, _)| task.tags.contains(*tag))
                .map(|(tag, name, members)| {
                    let strength = if description.contains(tag) { 1.0 } else { 0.5 };
                    let cost: u64 = members.iter().map(|(_, c)| c).sum();
                    (strength, cost, name, members)
                })
                .collect();
        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let mut running: u64 =
            plan.budget.total + candidates.iter().map(|(_, cost, _, _)| cost).sum::<u64>();
        let mut dropped = Vec::new();
        // Shed lowest-priority groups from the tail until the plan fits.
        while running > self.config.specialist_budget_ceiling {
            match candidates.pop() {
                Some((strength, cost, name, _)) => {
                    wlog_debug!(
                        "Dropping specialist group '{}' (strength={:.1}, cost={}): over ceiling",
                        name,
                        strength,
                        cost
                    );
                    running -= cost;
                    dropped.push(name.to_string());
                }
                None => break,
            }
        }

        for (_, cost, name, members) in candidates {
            let invocations = members
                .into_iter()
                .map(|(worker, hint)| WorkerInvocation::new(worker, hint))
                .collect();
            plan.phases[1]
                .groups
                .push(ParallelGroup::new(name, invocations).optional());
            plan.budget.per_phase[1] += cost;
            plan.budget.total += cost;
        }
        plan.metadata.dropped_groups = dropped;
    }
}
