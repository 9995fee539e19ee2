//! End-to-end runs through the engine facade.

use std::collections::BTreeSet;

use waypoint::plan::complexity::MethodologyTier;
use waypoint::plan::types::FLAG_DIRECT_PATTERN_MATCH;
use waypoint::{
    Difficulty, Engine, EngineConfig, InMemoryKnowledgeStore, KnowledgeStore, Orchestrator,
    RunStatus, Task, Tier,
};

use crate::fixtures::{self, Script};

#[tokio::test]
async fn full_run_completes_and_reports_trace() {
    let (mut engine, _events) = Engine::new(
        EngineConfig::default(),
        fixtures::echo_registry(),
        Box::new(InMemoryKnowledgeStore::new()),
    );
    let task = fixtures::task("investigate request routing behaviour");
    let result = engine.run(&task).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.success);
    assert_eq!(result.tier_reached, Tier::Tier1);
    assert!(result.usage > 0);
    // Unknown topic means the full methodology ran end to end.
    assert!(result.findings.contains_key("knowledge-discovery"));
    assert!(result.findings.contains_key("enhanced-analysis"));
    assert!(result.findings.contains_key("cross-reference"));
    assert!(result
        .trace
        .iter()
        .any(|line| line.contains("phase 'foundation' complete")));
    assert!(result.trace.iter().any(|line| line.contains("success=true")));
}

#[tokio::test]
async fn direct_pattern_match_exits_early() {
    // The foundation worker raises the direct-match flag; light and
    // medium plans exit before any later phase dispatches.
    let registry = fixtures::scripted_registry(vec![(
        "knowledge-discovery",
        Script::Ok {
            essential: "exact pattern already documented",
            cost: 200,
            flags: vec![FLAG_DIRECT_PATTERN_MATCH],
            recommendations: vec![],
        },
    )]);
    let task = fixtures::task("review request routing");
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    let (orchestrator, _events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    assert_eq!(result.status, RunStatus::EarlyExited);
    assert!(result.success);
    assert_eq!(result.findings.len(), 1);
    assert!(result.findings.contains_key("knowledge-discovery"));
    assert!(result
        .trace
        .iter()
        .any(|line| line.contains("early exit after phase 'foundation'")));
}

#[tokio::test]
async fn findings_feed_the_next_run() {
    let mut store = InMemoryKnowledgeStore::new();
    // Pre-assessment sees nothing for this topic.
    assert!(store
        .query_summary(&fixtures::task("tune connection pooling").sub_topics())
        .unwrap()
        .is_empty());

    let (mut engine, _events) = Engine::new(
        EngineConfig::default(),
        fixtures::echo_registry(),
        Box::new(std::mem::take(&mut store)),
    );
    let first_task = fixtures::task("tune connection pooling");
    let first = engine.run(&first_task).await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);

    // The same topic now scores non-zero coverage, so the second plan is
    // no longer forced to the full methodology.
    let second_task = Task::new(
        "tune connection pooling",
        BTreeSet::new(),
        Difficulty::Low,
        None,
    )
    .unwrap();
    let frozen = engine.plan_for(&second_task).unwrap();
    assert_ne!(frozen.plan().methodology, MethodologyTier::Full);
}

#[tokio::test]
async fn failed_run_does_not_pollute_the_store() {
    let registry = fixtures::scripted_registry(vec![("cross-reference", Script::FailAlways)]);
    let (mut engine, _events) = Engine::new(
        EngineConfig::default(),
        registry,
        Box::new(InMemoryKnowledgeStore::new()),
    );
    let task = fixtures::task("audit connection lifecycle");
    let result = engine.run(&task).await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(!result.success);

    // A rerun of the same topic still sees an empty store: the failed
    // run appended nothing.
    let frozen = engine.plan_for(&task).unwrap();
    assert_eq!(frozen.plan().methodology, MethodologyTier::Full);
}
