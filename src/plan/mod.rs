//! Plan construction: complexity scoring, template expansion, and
//! structural validation ending in a frozen plan.

pub mod builder;
pub mod complexity;
pub mod types;
pub mod validator;

pub use builder::PlanBuilder;
pub use complexity::{ComplexityAssessor, ComplexityScore, MethodologyTier};
pub use types::{
    Budget, EarlyExitCondition, FrozenPlan, ParallelGroup, Phase, Plan, PlanMetadata,
    SuccessCriterion, WorkerInvocation, FLAG_DIRECT_PATTERN_MATCH, FLAG_RUN_COMPLETE,
};
pub use validator::PlanValidator;
