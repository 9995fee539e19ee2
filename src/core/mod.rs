//! Core building blocks: tasks, the budget model, and the worker
//! registry that binds names to contracts and implementations.

pub mod budget;
pub mod registry;
pub mod task;

pub use budget::{BudgetEvent, BudgetManager, Tier};
pub use registry::{
    default_contracts, EssentialContext, FnWorker, Recommendation, RecommendedAction, Worker,
    WorkerContract, WorkerRegistry, WorkerResult, WorkerStatus, ESSENTIAL_CAP_BYTES,
    FOUNDATION_WORKER,
};
pub use task::{Difficulty, Task, TaskId, PRIOR_KNOWLEDGE_CAP};
