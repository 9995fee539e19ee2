//! The engine facade: one entry point that takes a task through
//! knowledge query, complexity assessment, plan building, validation
//! (with the full-template safety net), orchestration, and the final
//! write-back of findings to the knowledge store.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::core::registry::WorkerRegistry;
use crate::core::task::Task;
use crate::exec::conflict::ConflictResolver;
use crate::exec::orchestrator::{Orchestrator, RunEvent};
use crate::exec::state::{RunResult, RunStatus};
use crate::knowledge::{BoundedSummary, KnowledgeStore, SUMMARY_CAP_BYTES};
use crate::plan::builder::PlanBuilder;
use crate::plan::complexity::ComplexityAssessor;
use crate::plan::types::FrozenPlan;
use crate::plan::validator::PlanValidator;
use crate::util::truncate_bytes;
use crate::{wlog, wlog_warn, Result};

pub struct Engine {
    config: EngineConfig,
    registry: Arc<WorkerRegistry>,
    store: Box<dyn KnowledgeStore>,
    assessor: ComplexityAssessor,
    builder: PlanBuilder,
    validator: PlanValidator,
    resolver: ConflictResolver,
    orchestrator: Orchestrator,
}

impl Engine {
    /// Build an engine around a worker registry and a knowledge store.
    /// Returns the engine plus the run event stream.
    pub fn new(
        config: EngineConfig,
        registry: Arc<WorkerRegistry>,
        store: Box<dyn KnowledgeStore>,
    ) -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (orchestrator, events) = Orchestrator::new(registry.clone(), config.clone());
        (
            Self {
                builder: PlanBuilder::new(config.clone()),
                validator: PlanValidator::new(config.clone()),
                assessor: ComplexityAssessor::new(),
                resolver: ConflictResolver::new(),
                config,
                registry,
                store,
                orchestrator,
            },
            events,
        )
    }

    /// Assess the task and produce a frozen plan for it. Validation
    /// failures fall back to the full template with no specialists.
    pub fn plan_for(&self, task: &Task) -> Result<FrozenPlan> {
        let summary = self.knowledge_for(task)?;
        let score = self.assessor.assess(task, summary.as_ref())?;
        let plan = self.builder.build(&score, task);
        match self.validator.validate(plan, &self.registry, &self.resolver) {
            Ok(frozen) => Ok(frozen),
            Err(e) => {
                wlog_warn!("Plan rejected ({}), falling back to the full template", e);
                self.validator
                    .validate(self.builder.fallback(), &self.registry, &self.resolver)
            }
        }
    }

    /// Run a task end to end. Only malformed input or infrastructure
    /// problems surface as errors; worker-level failure is reported on
    /// the result.
    pub async fn run(&mut self, task: &Task) -> Result<RunResult> {
        let frozen = self.plan_for(task)?;
        wlog!(
            "Engine dispatching task {} on a {} plan",
            task.id.short(),
            frozen.plan().methodology
        );
        let result = self.orchestrator.run(&frozen, task).await?;
        if result.status != RunStatus::Failed {
            self.append_findings(task, &result)?;
        }
        Ok(result)
    }

    /// Query the store for the task's topics, falling back to the prior
    /// knowledge carried on the task itself.
    fn knowledge_for(&self, task: &Task) -> Result<Option<BoundedSummary>> {
        let mut topics = task.sub_topics();
        topics.extend(task.tags.iter().cloned());
        let summary = self.store.query_summary(&topics)?;
        if !summary.is_empty() {
            return Ok(Some(summary));
        }
        Ok(task
            .prior_knowledge
            .as_ref()
            .map(|text| BoundedSummary::new(BTreeSet::new(), text)))
    }

    /// Fold the run's retained essentials back into the store, bounded
    /// the same way reads are.
    fn append_findings(&mut self, task: &Task, result: &RunResult) -> Result<()> {
        if result.findings.is_empty() {
            return Ok(());
        }
        let text = result
            .findings
            .iter()
            .map(|(worker, finding)| format!("{}: {}", worker, finding))
            .collect::<Vec<_>>()
            .join("\n");
        let summary = BoundedSummary::new(
            task.sub_topics(),
            &truncate_bytes(&text, SUMMARY_CAP_BYTES),
        );
        self.store.append_findings(summary)?;
        wlog!(
            "Findings for task {} appended to the knowledge store",
            task.id.short()
        );
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
