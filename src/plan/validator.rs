//! Structural validation and freezing of plans.
//!
//! The validator is the only module that can produce a [`FrozenPlan`],
//! so the orchestrator can rely on every invariant checked here without
//! re-checking. High-cost or specialist-heavy plans additionally get an
//! advisory review from the conflict resolver before freezing.

use crate::config::EngineConfig;
use crate::core::registry::{WorkerRegistry, FOUNDATION_WORKER};
use crate::exec::conflict::ConflictResolver;
use crate::{wlog_debug, wlog_warn, Error, Result};

use super::types::{FrozenPlan, Plan};

/// Fraction of the total budget above which a single phase is considered
/// skewed and gets rebalanced down.
const PHASE_SKEW_FRACTION: f64 = 0.75;

pub struct PlanValidator {
    config: EngineConfig,
}

impl PlanValidator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Validate the plan, applying at most `max_plan_revisions`
    /// rebalancing revisions, and freeze it. Rejections carry the reason.
    pub fn validate(
        &self,
        mut plan: Plan,
        registry: &WorkerRegistry,
        resolver: &ConflictResolver,
    ) -> Result<FrozenPlan> {
        self.check_foundation_first(&plan)?;
        self.check_workers_registered(&plan, registry)?;
        self.check_success_criterion(&plan)?;
        self.rebalance_skew(&mut plan);
        self.check_budget_sum(&plan)?;

        let specialist_groups = plan
            .phases
            .iter()
            .flat_map(|p| &p.groups)
            .filter(|g| g.optional)
            .count();
        if plan.budget.total > self.config.high_cost_threshold || specialist_groups > 1 {
            let notes = resolver.advisory_review(&plan);
            for note in &notes {
                wlog_warn!("Plan advisory: {}", note);
            }
            plan.metadata.advisory_notes.extend(notes);
        }

        wlog_debug!(
            "Plan frozen: tier={}, phases={}, total={}, revisions={}",
            plan.methodology,
            plan.phases.len(),
            plan.budget.total,
            plan.metadata.revisions
        );
        Ok(FrozenPlan(plan))
    }

    fn check_foundation_first(&self, plan: &Plan) -> Result<()> {
        let first = plan
            .phases
            .first()
            .ok_or_else(|| Error::PlanInvalid("plan has no phases".to_string()))?;
        let sole_foundation = first.groups.len() == 1
            && first.groups[0].invocations.len() == 1
            && first.groups[0].invocations[0].worker == FOUNDATION_WORKER;
        if !sole_foundation {
            return Err(Error::PlanInvalid(format!(
                "first phase must be a single '{}' invocation",
                FOUNDATION_WORKER
            )));
        }
        Ok(())
    }

    fn check_workers_registered(&self, plan: &Plan, registry: &WorkerRegistry) -> Result<()> {
        for name in plan.worker_names() {
            if !registry.contains(name) {
                return Err(Error::UnknownWorker(name.to_string()));
            }
            // A contract without a bound implementation would otherwise
            // only surface mid-run.
            registry.worker(name)?;
        }
        Ok(())
    }

    fn check_budget_sum(&self, plan: &Plan) -> Result<()> {
        if plan.budget.per_phase.len() != plan.phases.len() {
            return Err(Error::PlanInvalid(format!(
                "budget covers {} phases but plan has {}",
                plan.budget.per_phase.len(),
                plan.phases.len()
            )));
        }
        if plan.budget.phase_sum() > plan.budget.total {
            return Err(Error::PlanInvalid(format!(
                "per-phase budgets sum to {} but total is {}",
                plan.budget.phase_sum(),
                plan.budget.total
            )));
        }
        Ok(())
    }

    fn check_success_criterion(&self, plan: &Plan) -> Result<()> {
        if plan.success.description.trim().is_empty() || plan.success.flag.trim().is_empty() {
            return Err(Error::PlanInvalid(
                "success criterion must name a description and a flag".to_string(),
            ));
        }
        Ok(())
    }

    /// Cap any phase holding more than the skew fraction of the total
    /// budget, bounded by the configured revision limit.
    fn rebalance_skew(&self, plan: &mut Plan) {
        let cap = (plan.budget.total as f64 * PHASE_SKEW_FRACTION) as u64;
        for i in 0..plan.budget.per_phase.len() {
            if plan.metadata.revisions >= self.config.max_plan_revisions {
                return;
            }
            if plan.budget.per_phase[i] > cap {
                wlog_debug!(
                    "Rebalancing phase {}: budget {} capped to {}",
                    i,
                    plan.budget.per_phase[i],
                    cap
                );
                plan.budget.per_phase[i] = cap;
                plan.metadata.revisions += 1;
                plan.metadata
                    .advisory_notes
                    .push(format!("phase {} budget capped to {} units", i, cap));
            }
        }
    }
}
