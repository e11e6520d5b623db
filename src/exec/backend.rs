// src/exec/backend.rs

//! Pluggable step runner abstraction.
//!
//! The engine talks to a `StepRunner` instead of spawning processes itself.
//! This makes it easy to swap in a fake runner in tests while keeping the
//! production subprocess implementation in [`super::process`].

use std::future::Future;
use std::pin::Pin;

use crate::dag::{RunResult, StepSpec};

/// Runs one step's whole attempt series and returns its normalized result.
///
/// Implementations never fail: machinery errors are reported as a `Failed`
/// [`RunResult`] with a diagnostic.
pub trait StepRunner: Send + Sync + 'static {
    fn run(&self, step: StepSpec) -> Pin<Box<dyn Future<Output = RunResult> + Send + '_>>;
}

impl<R: StepRunner + ?Sized> StepRunner for std::sync::Arc<R> {
    fn run(&self, step: StepSpec) -> Pin<Box<dyn Future<Output = RunResult> + Send + '_>> {
        (**self).run(step)
    }
}
