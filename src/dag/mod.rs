// src/dag/mod.rs

//! Dependency graph and scheduling.
//!
//! - [`graph`] turns declarative [`DependencyEntry`] lists into an immutable
//!   [`DependencyGraph`].
//! - [`state`] holds the per-run [`InitState`] bookkeeping.
//! - [`scheduler`] contains the wavefront loop that launches ready tasks
//!   concurrently and reports how the run ended.

pub mod graph;
pub mod scheduler;
pub mod state;

pub use graph::{DependencyEntry, DependencyGraph, DependencyRef};
pub use scheduler::{RunOutcome, RunReport, Scheduler, StatusHandle, TaskFailure};
pub use state::{InitState, StateTracker};
