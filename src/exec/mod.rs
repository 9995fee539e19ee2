//! Plan execution: the orchestrator, its run state, and conflict
//! resolution between concurrently-produced results.

pub mod conflict;
pub mod orchestrator;
pub mod state;

pub use conflict::{
    ConflictClassification, ConflictEntry, ConflictRecord, ConflictResolver, Resolution,
    ResolutionMethod,
};
pub use orchestrator::{Orchestrator, RunEvent};
pub use state::{ExecutionState, RunResult, RunStatus};
