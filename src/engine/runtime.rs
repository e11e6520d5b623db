// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dag::scheduler::stalled_error;
use crate::dag::{
    DependencyGraph, RunResult, RunStatus, RunSummary, Scheduler, StatusTracker, StepSpec,
};
use crate::errors::{DagrunError, Result};
use crate::exec::StepRunner;
use crate::types::ExecutionMode;

use super::RunOptions;
use super::pool::WorkerPool;

/// Drives one invocation of the pipeline.
///
/// All graph semantics live in [`Scheduler`]; this type owns the async side:
/// dispatching ready steps to the [`WorkerPool`], awaiting completions, and
/// feeding them back in batches.
pub struct PipelineRuntime<R: StepRunner> {
    runner: Arc<R>,
    options: RunOptions,
}

impl<R: StepRunner> fmt::Debug for PipelineRuntime<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRuntime")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R: StepRunner> PipelineRuntime<R> {
    pub fn new(runner: R, options: RunOptions) -> Self {
        Self::with_shared_runner(Arc::new(runner), options)
    }

    pub fn with_shared_runner(runner: Arc<R>, options: RunOptions) -> Self {
        Self { runner, options }
    }

    /// Run the whole DAG in the configured mode.
    pub async fn run(&self, specs: Vec<StepSpec>) -> Result<RunSummary> {
        match self.options.mode {
            ExecutionMode::Parallel => self.run_parallel(specs).await,
            ExecutionMode::Sequential => self.run_sequential(specs).await,
        }
    }

    /// Respect the graph: dependency order, skip/force cascade, abort policy.
    ///
    /// After the abort policy fires, steps already dispatched are awaited and
    /// their results recorded, but nothing new is submitted.
    pub async fn run_parallel(&self, specs: Vec<StepSpec>) -> Result<RunSummary> {
        let mut scheduler = Scheduler::from_specs(specs, self.options.global_force)?;
        let mut pool = WorkerPool::new(Arc::clone(&self.runner), self.options.max_workers);

        info!(
            steps = scheduler.graph().len(),
            max_workers = pool.max_workers(),
            force_any = scheduler.force_any(),
            "DAG parallel execution started"
        );

        loop {
            while pool.has_capacity() {
                let Some(scheduled) = scheduler.next_dispatch() else {
                    break;
                };
                if let Some(ref note) = scheduled.forced {
                    warn!(step = %scheduled.name(), note = %note, "forced step dispatched");
                }
                pool.spawn(scheduled);
            }

            if pool.in_flight() == 0 {
                if scheduler.has_running() {
                    return Err(stalled_error(&scheduler));
                }
                break;
            }

            let Some(first) = pool.next_completion().await else {
                return Err(stalled_error(&scheduler));
            };
            scheduler.handle_completion(&first.step, &first.result);

            while let Some(next) = pool.try_next_completion() {
                scheduler.handle_completion(&next.step, &next.result);
            }

            if scheduler.end_batch() && pool.in_flight() > 0 {
                info!(
                    in_flight = pool.in_flight(),
                    "waiting for in-flight steps to finish after abort"
                );
            }
        }

        Ok(scheduler.into_summary())
    }

    /// Run every step, one at a time, in declaration order.
    ///
    /// No skip/force cascade is evaluated: every step is executed and only
    /// its own reported status is recorded.
    pub async fn run_sequential(&self, specs: Vec<StepSpec>) -> Result<RunSummary> {
        DependencyGraph::build(&specs)?;
        info!(steps = specs.len(), "pipeline sequential execution started");

        let mut tracker = StatusTracker::new();
        for spec in specs {
            info!(step = %spec.name, "running step");
            let name = spec.name.clone();
            let result = self.runner.run(spec).await;
            record_result(&mut tracker, &name, &result);
        }

        Ok(tracker.finish(Vec::new(), false))
    }

    /// Run only `name`, ignoring its dependencies.
    pub async fn run_single(&self, specs: Vec<StepSpec>, name: &str) -> Result<RunSummary> {
        let Some(spec) = specs.into_iter().find(|s| s.name == name) else {
            error!(step = %name, "step not defined in DAG");
            return Err(DagrunError::UnknownStep(name.to_string()));
        };

        info!(step = %name, "running only step");
        let result = self.runner.run(spec).await;

        let mut tracker = StatusTracker::new();
        record_result(&mut tracker, name, &result);
        Ok(tracker.finish(Vec::new(), false))
    }
}

fn record_result(tracker: &mut StatusTracker, name: &str, result: &RunResult) {
    match result.status {
        RunStatus::Success => info!(step = %name, "step completed successfully"),
        RunStatus::Skipped => warn!(step = %name, "step was skipped by its own logic"),
        RunStatus::Failed => {
            error!(step = %name, reason = %result.reason(), "step failed")
        }
    }
    tracker.record(name, result.status, result.reason());
}
