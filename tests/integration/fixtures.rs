//! Shared fixtures: scripted worker registries and plan helpers.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use waypoint::core::registry::default_contracts;
use waypoint::plan::complexity::{ComplexityScore, MethodologyTier};
use waypoint::{
    ConflictResolver, Difficulty, EngineConfig, EssentialContext, FnWorker, FrozenPlan, Plan,
    PlanBuilder, PlanValidator, Recommendation, Task, Worker, WorkerRegistry, WorkerResult,
};

/// Scripted behavior for one named worker; everything else echoes.
pub enum Script {
    Ok {
        essential: &'static str,
        cost: u64,
        flags: Vec<&'static str>,
        recommendations: Vec<Recommendation>,
    },
    FailAlways,
    FailOnce,
}

fn ok_worker(
    name: String,
    essential: String,
    cost: u64,
    flags: Vec<String>,
    recommendations: Vec<Recommendation>,
) -> Arc<dyn Worker> {
    Arc::new(FnWorker::new(move |_ctx: EssentialContext| {
        let name = name.clone();
        let essential = essential.clone();
        let flags = flags.clone();
        let recommendations = recommendations.clone();
        Box::pin(async move {
            let mut result =
                WorkerResult::ok(&name, &essential, cost).with_recommendations(recommendations);
            for flag in flags {
                result = result.with_flag(flag);
            }
            result
        }) as BoxFuture<'static, WorkerResult>
    }))
}

/// A registry with the default contract roster where every worker
/// succeeds with cost 100 unless overridden by a script.
pub fn scripted_registry(overrides: Vec<(&'static str, Script)>) -> Arc<WorkerRegistry> {
    let mut registry = WorkerRegistry::with_default_contracts();
    let mut scripts: std::collections::BTreeMap<&'static str, Script> =
        overrides.into_iter().collect();
    for contract in default_contracts() {
        let name = contract.name.clone();
        let worker: Arc<dyn Worker> = match scripts.remove(name.as_str()) {
            None => ok_worker(name.clone(), "done".to_string(), 100, Vec::new(), Vec::new()),
            Some(Script::Ok {
                essential,
                cost,
                flags,
                recommendations,
            }) => ok_worker(
                name.clone(),
                essential.to_string(),
                cost,
                flags.iter().map(|f| f.to_string()).collect(),
                recommendations,
            ),
            Some(Script::FailAlways) => {
                let worker_name = name.clone();
                Arc::new(FnWorker::new(move |_ctx: EssentialContext| {
                    let worker_name = worker_name.clone();
                    Box::pin(async move { WorkerResult::failed(&worker_name, "scripted failure") })
                        as BoxFuture<'static, WorkerResult>
                }))
            }
            Some(Script::FailOnce) => {
                let worker_name = name.clone();
                let attempts = Arc::new(AtomicUsize::new(0));
                Arc::new(FnWorker::new(move |_ctx: EssentialContext| {
                    let worker_name = worker_name.clone();
                    let first = attempts.fetch_add(1, Ordering::SeqCst) == 0;
                    Box::pin(async move {
                        if first {
                            WorkerResult::failed(&worker_name, "transient failure")
                        } else {
                            WorkerResult::ok(&worker_name, "recovered", 100)
                        }
                    }) as BoxFuture<'static, WorkerResult>
                }))
            }
        };
        registry.register_worker(name, worker);
    }
    Arc::new(registry)
}

pub fn echo_registry() -> Arc<WorkerRegistry> {
    scripted_registry(Vec::new())
}

pub fn task(description: &str) -> Task {
    Task::new(description, BTreeSet::new(), Difficulty::Medium, None).unwrap()
}

pub fn task_tagged(description: &str, tags: &[&str], difficulty: Difficulty) -> Task {
    Task::new(
        description,
        tags.iter().map(|t| t.to_string()).collect(),
        difficulty,
        None,
    )
    .unwrap()
}

pub fn score(tier: MethodologyTier) -> ComplexityScore {
    ComplexityScore {
        coverage: 0.5,
        gap: 0.5,
        difficulty: Difficulty::Medium,
        tier,
        confidence: 0.9,
    }
}

pub fn build_plan(tier: MethodologyTier, task: &Task) -> Plan {
    PlanBuilder::new(EngineConfig::default()).build(&score(tier), task)
}

pub fn freeze(plan: Plan, registry: &WorkerRegistry) -> FrozenPlan {
    PlanValidator::new(EngineConfig::default())
        .validate(plan, registry, &ConflictResolver::new())
        .unwrap()
}
