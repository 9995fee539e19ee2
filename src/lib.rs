//! Waypoint turns an incoming task into a resource-bounded, multi-phase
//! execution plan run across independent, narrowly-scoped workers, then
//! reconciles their outputs into a single coherent result.
//!
//! The pipeline: a [`Task`] is scored by the [`ComplexityAssessor`],
//! expanded into a [`Plan`] by the [`PlanBuilder`], frozen by the
//! [`PlanValidator`], and executed by the [`Orchestrator`] under the
//! tiered [`BudgetManager`]. The [`Engine`] facade wires all of it
//! together around a [`KnowledgeStore`].

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod exec;
pub mod knowledge;
pub mod log;
pub mod plan;
pub mod util;

pub use crate::config::EngineConfig;
pub use crate::core::{
    BudgetEvent, BudgetManager, Difficulty, EssentialContext, FnWorker, Recommendation,
    RecommendedAction, Task, TaskId, Tier, Worker, WorkerContract, WorkerRegistry, WorkerResult,
    WorkerStatus,
};
pub use crate::engine::Engine;
pub use crate::error::{Error, Result};
pub use crate::exec::{
    ConflictRecord, ConflictResolver, Orchestrator, Resolution, ResolutionMethod, RunEvent,
    RunResult, RunStatus,
};
pub use crate::knowledge::{BoundedSummary, InMemoryKnowledgeStore, KnowledgeStore};
pub use crate::plan::{
    ComplexityAssessor, ComplexityScore, FrozenPlan, MethodologyTier, Plan, PlanBuilder,
    PlanValidator,
};
