//! Conflict detection and resolution during execution.

use waypoint::plan::complexity::MethodologyTier;
use waypoint::{
    ConflictResolver, EngineConfig, Orchestrator, Recommendation, RecommendedAction,
    ResolutionMethod, WorkerResult,
};

use crate::fixtures::{self, Script};

#[tokio::test]
async fn contradictory_phase_results_produce_one_resolved_record() {
    // Scenario: two workers in the same parallel group disagree on the
    // same axis.
    let registry = fixtures::scripted_registry(vec![
        (
            "pattern-apply",
            Script::Ok {
                essential: "raise the cache ttl",
                cost: 100,
                flags: vec![],
                recommendations: vec![Recommendation::new(
                    "cache-ttl",
                    RecommendedAction::Increase,
                    "fewer backend lookups",
                )],
            },
        ),
        (
            "gap-analysis",
            Script::Ok {
                essential: "lower the cache ttl",
                cost: 100,
                flags: vec![],
                recommendations: vec![Recommendation::new(
                    "cache-ttl",
                    RecommendedAction::Decrease,
                    "stale grants risk",
                )],
            },
        ),
    ]);
    let task = fixtures::task("review cache policy");
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    let (orchestrator, _events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    assert_eq!(result.resolved_conflicts.len(), 1);
    let record = &result.resolved_conflicts[0];
    assert_eq!(record.axis, "cache-ttl");
    let resolution = record.resolution.as_ref().unwrap();
    assert_eq!(resolution.method, ResolutionMethod::Synthesis);

    // The retained findings carry the resolution, not the raw sides.
    assert_eq!(result.findings["pattern-apply"], resolution.text);
    assert_eq!(result.findings["gap-analysis"], resolution.text);
    assert!(!result.findings.values().any(|f| f == "raise the cache ttl"));
    assert!(result.unresolved_conflicts.is_empty());
}

#[tokio::test]
async fn compatible_overlap_keeps_each_workers_findings() {
    // Same-direction recommendations on a shared axis must not replace
    // either worker's retained findings.
    let registry = fixtures::scripted_registry(vec![
        (
            "pattern-apply",
            Script::Ok {
                essential: "retries mask transient errors",
                cost: 100,
                flags: vec![],
                recommendations: vec![Recommendation::new(
                    "retry-count",
                    RecommendedAction::Increase,
                    "transient errors",
                )],
            },
        ),
        (
            "gap-analysis",
            Script::Ok {
                essential: "upstream flakiness is the gap",
                cost: 100,
                flags: vec![],
                recommendations: vec![Recommendation::new(
                    "retry-count",
                    RecommendedAction::Increase,
                    "flaky upstream",
                )],
            },
        ),
    ]);
    let task = fixtures::task("review retry policy");
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    let (orchestrator, _events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    assert_eq!(result.resolved_conflicts.len(), 1);
    let record = &result.resolved_conflicts[0];
    let resolution = record.resolution.as_ref().unwrap();
    assert_eq!(resolution.method, ResolutionMethod::Merge);
    assert_eq!(
        result.findings["pattern-apply"],
        "retries mask transient errors"
    );
    assert_eq!(
        result.findings["gap-analysis"],
        "upstream flakiness is the gap"
    );
}

#[tokio::test]
async fn unresolvable_conflict_is_flagged_not_fatal() {
    // Equal-priority workers, no rationale to synthesize from.
    let registry = fixtures::scripted_registry(vec![
        (
            "writing-analyst",
            Script::Ok {
                essential: "avoid passive voice",
                cost: 100,
                flags: vec![],
                recommendations: vec![Recommendation::new(
                    "passive-voice",
                    RecommendedAction::Avoid,
                    "",
                )],
            },
        ),
        (
            "academic-analyst",
            Script::Ok {
                essential: "adopt passive voice",
                cost: 100,
                flags: vec![],
                recommendations: vec![Recommendation::new(
                    "passive-voice",
                    RecommendedAction::Adopt,
                    "",
                )],
            },
        ),
    ]);
    let task = fixtures::task_tagged(
        "polish the draft",
        &["writing"],
        waypoint::Difficulty::Medium,
    );
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    let (orchestrator, _events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    assert_eq!(result.unresolved_conflicts, vec!["passive-voice".to_string()]);
    // The run still finishes.
    assert_eq!(result.status, waypoint::RunStatus::Completed);
    assert!(result.success);
}

#[test]
fn resolution_is_byte_identical_across_reruns() {
    let resolver = ConflictResolver::new();
    let registry = fixtures::echo_registry();
    let results = vec![
        WorkerResult::ok("auth-performance", "perf view", 50).with_recommendations(vec![
            Recommendation::new("cache-ttl", RecommendedAction::Increase, "fewer lookups"),
        ]),
        WorkerResult::ok("auth-security", "security view", 50).with_recommendations(vec![
            Recommendation::new("cache-ttl", RecommendedAction::Decrease, "stale grants"),
        ]),
    ];
    let record = resolver.detect(&results).remove(0);
    let first = resolver.resolve(&record, &registry).unwrap();
    let second = resolver.resolve(&record, &registry).unwrap();
    assert_eq!(first.text.as_bytes(), second.text.as_bytes());
    assert_eq!(first, second);
}
