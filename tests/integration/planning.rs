//! Plan construction and validation behavior.

use std::collections::BTreeSet;

use waypoint::core::registry::FOUNDATION_WORKER;
use waypoint::plan::complexity::MethodologyTier;
use waypoint::{
    ComplexityAssessor, Difficulty, Engine, EngineConfig, InMemoryKnowledgeStore, Task,
};

use crate::fixtures;

#[test]
fn light_plan_for_well_covered_easy_task() {
    // Scenario: high knowledge coverage and low declared difficulty.
    let store = InMemoryKnowledgeStore::new()
        .with_entry("oauth", "token refresh documented")
        .with_entry("token", "rotation policy documented")
        .with_entry("refresh", "flow documented")
        .with_entry("explain", "prior writeups exist")
        .with_entry("flow", "sequence documented");
    let task = Task::new(
        "explain oauth token refresh flow",
        BTreeSet::new(),
        Difficulty::Low,
        None,
    )
    .unwrap();

    let assessor = ComplexityAssessor::new();
    let summary = {
        use waypoint::KnowledgeStore;
        store.query_summary(&task.sub_topics()).unwrap()
    };
    let score = assessor.assess(&task, Some(&summary)).unwrap();
    assert!(score.coverage > 0.8);
    assert_eq!(score.tier, MethodologyTier::Light);

    let plan = fixtures::build_plan(score.tier, &task);
    assert_eq!(plan.phases.len(), 2);
    assert!(plan.budget.total <= 5_000);
    assert_eq!(plan.phases[0].worker_names(), vec![FOUNDATION_WORKER]);
}

#[test]
fn authentication_tag_injects_specialist_group() {
    // Scenario: medium tier with the authentication specialists.
    let task = fixtures::task_tagged(
        "review session handling",
        &["authentication"],
        Difficulty::Medium,
    );
    let plan = fixtures::build_plan(MethodologyTier::Medium, &task);
    let group = plan.phases[1]
        .groups
        .iter()
        .find(|g| g.name == "authentication")
        .expect("specialist group injected into the first post-foundation phase");
    assert_eq!(
        group.worker_names(),
        vec!["auth-performance", "auth-security", "auth-optimization"]
    );
    let group_budget: u64 = group.invocations.iter().map(|i| i.budget_hint).sum();
    assert_eq!(group_budget, 6_000);
}

#[test]
fn every_plan_is_foundation_first() {
    for tier in [
        MethodologyTier::Light,
        MethodologyTier::Medium,
        MethodologyTier::Full,
    ] {
        let task = fixtures::task_tagged(
            "audit the data pipeline",
            &["authentication", "data-flow"],
            Difficulty::Medium,
        );
        let plan = fixtures::build_plan(tier, &task);
        assert_eq!(plan.phases[0].groups.len(), 1);
        assert_eq!(plan.phases[0].groups[0].invocations.len(), 1);
        assert_eq!(
            plan.phases[0].groups[0].invocations[0].worker,
            FOUNDATION_WORKER
        );
    }
}

#[test]
fn phase_budgets_never_exceed_total() {
    for tier in [
        MethodologyTier::Light,
        MethodologyTier::Medium,
        MethodologyTier::Full,
    ] {
        let task = fixtures::task_tagged(
            "audit everything",
            &["authentication", "writing", "data-flow", "visualization"],
            Difficulty::Medium,
        );
        let plan = fixtures::build_plan(tier, &task);
        assert!(plan.budget.phase_sum() <= plan.budget.total);
    }
}

#[test]
fn plan_document_is_inspectable() {
    let task = fixtures::task("review request routing");
    let plan = fixtures::build_plan(MethodologyTier::Medium, &task);
    let doc = plan.to_document().unwrap();
    let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert_eq!(value["methodology_type"], "medium");
    assert_eq!(value["phases"].as_array().unwrap().len(), 3);
    assert!(value["budget"]["total"].as_u64().unwrap() >= 8_000);
}

#[test]
fn engine_falls_back_to_full_template_on_invalid_plan() {
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use waypoint::core::registry::default_contracts;
    use waypoint::{EssentialContext, FnWorker, WorkerRegistry, WorkerResult};

    // A registry missing one authentication specialist makes the tagged
    // plan fail validation; the engine retries with the full template
    // and no specialists, which always validates.
    let mut registry = WorkerRegistry::new();
    for contract in default_contracts()
        .into_iter()
        .filter(|c| c.name != "auth-security")
    {
        let name = contract.name.clone();
        registry.register_contract(contract);
        registry.register_worker(
            name.clone(),
            Arc::new(FnWorker::new(move |_ctx: EssentialContext| {
                let worker = name.clone();
                Box::pin(async move { WorkerResult::ok(&worker, "done", 100) })
                    as BoxFuture<'static, WorkerResult>
            })),
        );
    }
    let (engine, _events) = Engine::new(
        EngineConfig::default(),
        Arc::new(registry),
        Box::new(InMemoryKnowledgeStore::new()),
    );
    let task = fixtures::task_tagged(
        "review session handling",
        &["authentication"],
        Difficulty::Medium,
    );
    let frozen = engine.plan_for(&task).unwrap();
    assert_eq!(frozen.plan().methodology, MethodologyTier::Full);
    assert!(frozen
        .plan()
        .phases
        .iter()
        .all(|p| p.groups.iter().all(|g| !g.optional)));
}
