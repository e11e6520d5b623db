// src/dag/scheduler_step.rs

//! Types exchanged between the scheduler and the engine.

use crate::dag::step::{StepName, StepSpec};

/// A step the scheduler wants a worker to run now.
#[derive(Debug, Clone)]
pub struct ScheduledStep {
    pub spec: StepSpec,
    /// Set when the step runs despite a non-successful dependency because
    /// force applies; explains which parents were not successful.
    pub forced: Option<String>,
}

impl ScheduledStep {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Structured result of feeding one completion into the scheduler.
///
/// Useful for tests that step the scheduler by hand.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Children that became `Ready` (normally or through force).
    pub newly_ready: Vec<StepName>,
    /// Steps cascade-skipped without running, in propagation order.
    pub newly_skipped: Vec<StepName>,
    /// Subset of `newly_ready` that only runs because force applies.
    pub newly_forced: Vec<StepName>,
}
