//! Integration tests for the waypoint engine.
//!
//! Each module covers one slice of behavior: plan construction,
//! conflict handling, failure recovery, budget degradation, and full
//! end-to-end runs.

mod fixtures;

mod conflict_resolution;
mod degradation;
mod planning;
mod workflow_e2e;
