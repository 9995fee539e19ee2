//! Budget-pressure behavior: tier downgrades, specialist shedding, and
//! the emergency dispatch stop.

use waypoint::plan::complexity::MethodologyTier;
use waypoint::{Difficulty, EngineConfig, Orchestrator, RunEvent, RunStatus, Tier};

use crate::fixtures::{self, Script};

#[tokio::test]
async fn tier3_sheds_optional_specialist_groups() {
    // Scenario: foundation burns most of the budget, pushing the run
    // into Tier3 before the specialist phase starts.
    let registry = fixtures::scripted_registry(vec![(
        "knowledge-discovery",
        Script::Ok {
            essential: "thin coverage",
            cost: 10_000,
            flags: vec![],
            recommendations: vec![],
        },
    )]);
    let task = fixtures::task_tagged(
        "review session handling",
        &["authentication"],
        Difficulty::Medium,
    );
    // Medium template (8_000) plus the authentication group (6_000).
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    assert_eq!(frozen.plan().budget.total, 14_000);

    let (orchestrator, _events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier_reached, Tier::Tier3);
    assert!(result
        .dropped_groups
        .contains(&"authentication".to_string()));
    // The specialists never ran; the mandatory analysis group did.
    assert!(!result.findings.contains_key("auth-security"));
    assert!(result.findings.contains_key("pattern-apply"));
    assert!(result.findings.contains_key("cross-reference"));
}

#[tokio::test]
async fn tier4_stops_dispatch_and_synthesizes_best_effort() {
    let registry = fixtures::scripted_registry(vec![(
        "knowledge-discovery",
        Script::Ok {
            essential: "burned the budget",
            cost: 13_000,
            flags: vec![],
            recommendations: vec![],
        },
    )]);
    let task = fixtures::task_tagged(
        "review session handling",
        &["authentication"],
        Difficulty::Medium,
    );
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    let (orchestrator, _events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    // Degradation, not failure: the run completes on what it has.
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.tier_reached, Tier::Tier4);
    assert_eq!(result.findings.len(), 1);
    assert!(result.findings.contains_key("knowledge-discovery"));
    assert!(result
        .trace
        .iter()
        .any(|line| line.contains("emergency tier reached")));
}

#[tokio::test]
async fn tier_transitions_only_get_stricter() {
    let registry = fixtures::scripted_registry(vec![
        (
            "knowledge-discovery",
            Script::Ok {
                essential: "x",
                cost: 4_000,
                flags: vec![],
                recommendations: vec![],
            },
        ),
        (
            "pattern-apply",
            Script::Ok {
                essential: "x",
                cost: 3_000,
                flags: vec![],
                recommendations: vec![],
            },
        ),
        (
            "gap-analysis",
            Script::Ok {
                essential: "x",
                cost: 3_000,
                flags: vec![],
                recommendations: vec![],
            },
        ),
    ]);
    let task = fixtures::task("review request routing");
    let frozen = fixtures::freeze(
        fixtures::build_plan(MethodologyTier::Medium, &task),
        &registry,
    );
    let (orchestrator, mut events) = Orchestrator::new(registry, EngineConfig::default());
    let result = orchestrator.run(&frozen, &task).await.unwrap();

    let mut last = Tier::Tier1;
    while let Ok(event) = events.try_recv() {
        if let RunEvent::TierChanged { from, to } = event {
            assert!(to > from);
            assert!(from >= last);
            last = to;
        }
    }
    assert!(result.tier_reached >= last);
}
