//! Phase-by-phase execution of a frozen plan.
//!
//! The orchestrator walks `Pending -> Running(i) -> {Running(i+1) |
//! EarlyExited | Failed | Completed}`. Within a phase every invocation
//! of every scheduled group runs concurrently under a cost-proportional
//! deadline; the phase blocks on the full barrier. A failed or timed-out
//! invocation is retried exactly once with a fresh context; a second
//! failure halts the run naming the worker and phase. After the barrier
//! the compaction hook extracts capped essentials, settles conflicts,
//! charges the budget, and drops every detailed payload.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::core::budget::{BudgetEvent, BudgetManager, Tier};
use crate::core::registry::{EssentialContext, Worker, WorkerRegistry, WorkerResult, WorkerStatus};
use crate::core::task::Task;
use crate::plan::types::{EarlyExitCondition, FrozenPlan, WorkerInvocation, FLAG_RUN_COMPLETE};
use crate::{wlog, wlog_error, wlog_warn, Error, Result};

use super::conflict::{ConflictClassification, ConflictResolver};
use super::state::{ExecutionState, RunResult, RunStatus};

/// Events emitted while a run progresses, for observers outside the
/// engine.
#[derive(Debug, Clone)]
pub enum RunEvent {
    PhaseStarted { index: usize, name: String },
    WorkerFinished { worker: String, phase: String, status: WorkerStatus },
    WorkerRetried { worker: String, phase: String },
    ConflictDetected { axis: String },
    ConflictResolved { axis: String },
    GroupsDropped { phase: String, groups: Vec<String> },
    TierChanged { from: Tier, to: Tier },
    EarlyExit { after_phase: usize },
    RunFinished { status: RunStatus },
}

pub struct Orchestrator {
    registry: Arc<WorkerRegistry>,
    config: EngineConfig,
    resolver: ConflictResolver,
    events: mpsc::UnboundedSender<RunEvent>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                config,
                resolver: ConflictResolver::new(),
                events: tx,
            },
            rx,
        )
    }

    fn emit(&self, event: RunEvent) {
        let _ = self.events.send(event);
    }

    /// Execute a frozen plan to completion, early exit, or failure.
    /// Failure of a doubly-retried worker produces a Failed result, not
    /// an Err; hard errors are reserved for infrastructure problems.
    pub async fn run(&self, frozen: &FrozenPlan, task: &Task) -> Result<RunResult> {
        let plan = frozen.plan();
        let (mut budget, mut budget_rx) = BudgetManager::new(plan.budget.total);
        let emergency = budget.emergency_token();
        let mut state = ExecutionState::new();
        state.dropped_groups = plan.metadata.dropped_groups.clone();
        let mut early_exited = false;

        wlog!(
            "Run started for task {}: {} phases, budget {}",
            task.id.short(),
            plan.phases.len(),
            plan.budget.total
        );

        for (index, phase) in plan.phases.iter().enumerate() {
            if emergency.is_cancelled() {
                state.push_trace(format!(
                    "emergency tier reached: skipping phase '{}' and all later phases",
                    phase.name
                ));
                wlog_warn!("Emergency tier: dispatch stopped before phase '{}'", phase.name);
                break;
            }
            state.phase_index = index;
            self.emit(RunEvent::PhaseStarted {
                index,
                name: phase.name.clone(),
            });

            // Under Tier3 pressure, optional specialist groups are shed
            // before dispatch.
            let mut groups: Vec<_> = phase.groups.iter().collect();
            if budget.current_tier() >= Tier::Tier3 {
                let shed: Vec<String> = groups
                    .iter()
                    .filter(|g| g.optional)
                    .map(|g| g.name.clone())
                    .collect();
                if !shed.is_empty() {
                    wlog_warn!(
                        "Tier {} in phase '{}': dropping groups {:?}",
                        budget.current_tier(),
                        phase.name,
                        shed
                    );
                    state.push_trace(format!(
                        "phase '{}': dropped optional groups {} under budget pressure",
                        phase.name,
                        shed.join(", ")
                    ));
                    self.emit(RunEvent::GroupsDropped {
                        phase: phase.name.clone(),
                        groups: shed.clone(),
                    });
                    state.dropped_groups.extend(shed);
                    groups.retain(|g| !g.optional);
                }
            }

            // Dispatch the whole phase, group by group, and await the
            // barrier. group_costs pairs member count with charged cost.
            let mut phase_results: Vec<WorkerResult> = Vec::new();
            let mut group_costs: Vec<(usize, u64)> = Vec::new();
            for group in &groups {
                let outcome = self
                    .dispatch_group(&group.invocations, &phase.name, task, &state)
                    .await?;
                match outcome {
                    Ok(results) => {
                        let cost: u64 = results.iter().map(|(_, c)| c).sum();
                        group_costs.push((group.invocations.len(), cost));
                        phase_results.extend(results.into_iter().map(|(r, _)| r));
                    }
                    Err(failure) => {
                        let message = failure.to_string();
                        wlog_error!("Run failed: {}", message);
                        state.push_trace(format!("phase '{}' failed: {}", phase.name, message));
                        state.tier_reached = budget.current_tier();
                        self.emit(RunEvent::RunFinished {
                            status: RunStatus::Failed,
                        });
                        return Ok(state.into_result(RunStatus::Failed, false, Some(message)));
                    }
                }
            }

            // Post-phase compaction hook: settle conflicts, keep capped
            // essentials, drop detailed payloads, charge the budget.
            self.compact_phase(&mut state, &phase_results);
            for (members, cost) in group_costs {
                // Parallel groups pay a coordination surcharge.
                let overhead = if members > 1 { cost / 10 } else { 0 };
                budget.charge(cost + overhead);
            }
            self.drain_budget_events(&mut budget_rx, &mut state);
            state.usage = budget.usage();
            state.tier_reached = budget.current_tier();
            state.push_trace(format!(
                "phase '{}' complete: {} results, usage {}/{}, {}",
                phase.name,
                phase_results.len(),
                budget.usage(),
                budget.total(),
                budget.current_tier()
            ));

            if self.should_exit_early(&plan.early_exit, index, &state) {
                wlog!("Early exit after phase '{}'", phase.name);
                state.push_trace(format!("early exit after phase '{}'", phase.name));
                self.emit(RunEvent::EarlyExit { after_phase: index });
                early_exited = true;
                break;
            }
        }

        self.drain_budget_events(&mut budget_rx, &mut state);
        state.usage = budget.usage();
        state.tier_reached = budget.current_tier();

        let status = if early_exited {
            RunStatus::EarlyExited
        } else {
            RunStatus::Completed
        };
        // The run finished its scheduled work (early exit included), so
        // the completion flag is raised and checked against the plan's
        // success criterion.
        state.flags.insert(FLAG_RUN_COMPLETE.to_string());
        let success = state.flags.contains(&plan.success.flag);
        state.push_trace(format!(
            "run {}: success={}, tier {}",
            status, success, state.tier_reached
        ));
        self.emit(RunEvent::RunFinished { status });
        wlog!("Run finished: {} (success={})", status, success);
        Ok(state.into_result(status, success, None))
    }

    /// Run one group's invocations concurrently, bounded by
    /// `max_concurrent`. The outer Result is infrastructure failure; the
    /// inner Result is the run-halting double failure of a worker.
    async fn dispatch_group(
        &self,
        invocations: &[WorkerInvocation],
        phase_name: &str,
        task: &Task,
        state: &ExecutionState,
    ) -> Result<std::result::Result<Vec<(WorkerResult, u64)>, Error>> {
        let mut collected = Vec::with_capacity(invocations.len());
        for chunk in invocations.chunks(self.config.max_concurrent.max(1)) {
            let mut handles = Vec::with_capacity(chunk.len());
            for invocation in chunk {
                let worker = self.registry.worker(&invocation.worker)?;
                let deadline = self.deadline_for(&invocation.worker)?;
                let ctx = self.context_for(invocation, task, state);
                let retry_ctx = self.context_for(invocation, task, state);
                let worker_name = invocation.worker.clone();
                let phase = phase_name.to_string();
                let events = self.events.clone();
                handles.push(tokio::spawn(async move {
                    Self::invoke_with_retry(
                        worker, ctx, retry_ctx, deadline, worker_name, phase, events,
                    )
                    .await
                }));
            }
            for joined in futures::future::join_all(handles).await {
                let outcome = joined.map_err(|e| Error::TaskJoin(e.to_string()))?;
                match outcome {
                    Ok(pair) => collected.push(pair),
                    Err(failure) => return Ok(Err(failure)),
                }
            }
        }
        Ok(Ok(collected))
    }

    /// One attempt plus at most one retry with a fresh context. Returns
    /// the surviving result and the total cost charged across attempts.
    async fn invoke_with_retry(
        worker: Arc<dyn Worker>,
        ctx: EssentialContext,
        retry_ctx: EssentialContext,
        deadline: Duration,
        worker_name: String,
        phase: String,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> std::result::Result<(WorkerResult, u64), Error> {
        let first = Self::attempt(&*worker, ctx, deadline).await;
        let mut charged = first.as_ref().map(|r| r.cost).unwrap_or(0);
        match first {
            Some(result) if result.status != WorkerStatus::Failed => {
                let _ = events.send(RunEvent::WorkerFinished {
                    worker: worker_name,
                    phase,
                    status: result.status,
                });
                return Ok((result, charged));
            }
            Some(_) => {
                wlog_warn!(
                    "Worker '{}' failed in phase '{}', retrying once",
                    worker_name,
                    phase
                );
            }
            None => {
                wlog_warn!(
                    "Worker '{}' in phase '{}': {}, retrying once",
                    worker_name,
                    phase,
                    Error::Timeout(deadline)
                );
            }
        }
        let _ = events.send(RunEvent::WorkerRetried {
            worker: worker_name.clone(),
            phase: phase.clone(),
        });
        let second = Self::attempt(&*worker, retry_ctx, deadline).await;
        charged += second.as_ref().map(|r| r.cost).unwrap_or(0);
        match second {
            Some(result) if result.status != WorkerStatus::Failed => {
                let _ = events.send(RunEvent::WorkerFinished {
                    worker: worker_name,
                    phase,
                    status: result.status,
                });
                Ok((result, charged))
            }
            _ => Err(Error::WorkerFailure {
                worker: worker_name,
                phase,
            }),
        }
    }

    /// A single invocation under its deadline. `None` means timeout.
    async fn attempt(
        worker: &dyn Worker,
        ctx: EssentialContext,
        deadline: Duration,
    ) -> Option<WorkerResult> {
        tokio::time::timeout(deadline, worker.invoke(ctx)).await.ok()
    }

    fn deadline_for(&self, worker: &str) -> Result<Duration> {
        let contract = self.registry.contract(worker)?;
        Ok(Duration::from_millis(
            contract.avg_cost * self.config.deadline_ms_per_cost_unit,
        ))
    }

    /// Curate the size-capped context a worker receives: the task text,
    /// every retained upstream essential, and the budget hint.
    fn context_for(
        &self,
        invocation: &WorkerInvocation,
        task: &Task,
        state: &ExecutionState,
    ) -> EssentialContext {
        let mut ctx = EssentialContext::new(task.description.clone(), invocation.budget_hint);
        for (worker, finding) in &state.findings {
            ctx = ctx.with_upstream(worker.clone(), finding);
        }
        ctx
    }

    /// Merge essentials into state and settle any disagreement before
    /// the phase is considered complete. Raw findings on a contradictory
    /// axis are superseded by the resolution text; compatible overlap
    /// keeps each worker's own findings.
    fn compact_phase(&self, state: &mut ExecutionState, results: &[WorkerResult]) {
        for result in results {
            state.merge_result(result);
        }
        for mut record in self.resolver.detect(results) {
            self.emit(RunEvent::ConflictDetected {
                axis: record.axis.clone(),
            });
            match self.resolver.resolve(&record, &self.registry) {
                Ok(resolution) => {
                    if record.classification == ConflictClassification::Contradictory {
                        for entry in &record.entries {
                            state.supersede_finding(&entry.worker, &resolution.text);
                        }
                    }
                    self.emit(RunEvent::ConflictResolved {
                        axis: record.axis.clone(),
                    });
                    state.push_trace(format!(
                        "conflict on '{}' resolved by {:?}",
                        record.axis, resolution.method
                    ));
                    record.resolution = Some(resolution);
                    state.resolved_conflicts.push(record);
                }
                Err(Error::ConflictUnresolved { axis }) => {
                    wlog_warn!("Conflict on '{}' left unresolved", axis);
                    state.push_trace(format!("conflict on '{}' unresolved", axis));
                    state.unresolved_conflicts.push(axis);
                }
                Err(e) => {
                    wlog_error!("Conflict resolution error on '{}': {}", record.axis, e);
                    state.unresolved_conflicts.push(record.axis.clone());
                }
            }
        }
    }

    fn should_exit_early(
        &self,
        conditions: &[EarlyExitCondition],
        phase_index: usize,
        state: &ExecutionState,
    ) -> bool {
        conditions.iter().any(|condition| match condition {
            EarlyExitCondition::FlagSet { flag, after_phase } => {
                phase_index >= *after_phase && state.flags.contains(flag)
            }
            EarlyExitCondition::FindingContains { needle, after_phase } => {
                phase_index >= *after_phase
                    && state.findings.values().any(|f| f.contains(needle.as_str()))
            }
        })
    }
}

impl Orchestrator {
    /// Drain pending budget events into state and the run event stream.
    fn drain_budget_events(
        &self,
        rx: &mut mpsc::UnboundedReceiver<BudgetEvent>,
        state: &mut ExecutionState,
    ) {
        while let Ok(event) = rx.try_recv() {
            match event {
                BudgetEvent::TierChanged { from, to } => {
                    state.push_trace(format!("budget tier {} -> {}", from, to));
                    self.emit(RunEvent::TierChanged { from, to });
                }
                BudgetEvent::ChargeRefused { requested, remaining } => {
                    wlog_warn!(
                        "Budget charge refused: requested {}, remaining {}",
                        requested,
                        remaining
                    );
                    state.push_trace(format!(
                        "budget exhausted: charge of {} refused with {} remaining",
                        requested, remaining
                    ));
                }
            }
        }
    }
}
