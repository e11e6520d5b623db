// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`step`] holds the immutable step descriptors.
//! - [`graph`] derives forward/in-degree/reverse indexes and rejects
//!   unknown dependencies and cycles.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   steps are ready, force-run, or cascade-skipped.
//! - [`status`] and [`tracker`] hold step statuses, execution results and
//!   the run summary.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod status;
pub mod step;
pub mod tracker;

pub use graph::{ComponentLevels, DependencyGraph};
pub use scheduler::Scheduler;
pub use scheduler_step::{ScheduledStep, SchedulerStep};
pub use status::{RunResult, RunStatus, StepStatus};
pub use step::{Invocation, StepName, StepSpec};
pub use tracker::{RunSummary, StatusTracker};
