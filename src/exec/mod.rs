// src/exec/mod.rs

//! Step execution layer.
//!
//! This module is responsible for actually running a step's invocation,
//! using `tokio::process::Command`, and turning what it observes into a
//! [`crate::dag::RunResult`].
//!
//! - [`backend`] provides the `StepRunner` trait the engine dispatches to,
//!   which tests can replace with a fake implementation.
//! - [`process`] is the production subprocess runner with the retry loop.
//! - [`classifier`] is the per-stream line classification state machine.
//! - [`payload`] parses the structured skip/failure payload from stdout.

pub mod backend;
pub mod classifier;
pub mod payload;
pub mod process;

pub use backend::StepRunner;
pub use classifier::{ClassifiedLine, ClassifierState, LineClassifier};
pub use payload::{StepPayload, parse_payload};
pub use process::{ProcessOptions, ProcessRunner};
