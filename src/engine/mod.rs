// src/engine/mod.rs

//! Orchestration engine for dagrun.
//!
//! This module ties together:
//! - the DAG scheduler (pure, in [`crate::dag`])
//! - the bounded worker pool and its completion channel ([`pool`])
//! - the async runtime that dispatches ready steps and feeds completions
//!   back to the scheduler ([`runtime`])

use crate::dag::{RunResult, StepName};
use crate::types::ExecutionMode;

/// A worker finished one step.
#[derive(Debug, Clone)]
pub struct Completion {
    pub step: StepName,
    pub result: RunResult,
}

/// Options for one pipeline invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    /// Worker pool size in parallel mode.
    pub max_workers: usize,
    /// Global force flag (config `[options].force` or `--force`).
    pub global_force: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            max_workers: 4,
            global_force: false,
        }
    }
}

pub mod pool;
pub mod runtime;

pub use pool::WorkerPool;
pub use runtime::PipelineRuntime;
