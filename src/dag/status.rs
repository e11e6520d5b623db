// src/dag/status.rs

//! Step status and per-step execution results.

use std::fmt;

/// Lifecycle of a step within one run.
///
/// `Pending -> Ready -> Running -> {Success, Skipped, Failed}`, or
/// `Pending -> Skipped` when a cascade skip fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Waiting for at least one dependency to reach a terminal status.
    Pending,
    /// All dependencies are terminal and the step may be dispatched.
    Ready,
    /// Dispatched to a worker.
    Running,
    Success,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Skipped | StepStatus::Failed
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Ready => "ready",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of one step's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Skipped,
    Failed,
}

impl From<RunStatus> for StepStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => StepStatus::Success,
            RunStatus::Skipped => StepStatus::Skipped,
            RunStatus::Failed => StepStatus::Failed,
        }
    }
}

/// Normalized result of a step's whole attempt series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: RunStatus,
    /// Captured stdout of the last attempt.
    pub stdout: String,
    /// Captured stderr of the last attempt.
    pub stderr: String,
    pub diagnostic: Option<String>,
    /// Number of attempts actually made.
    pub attempts: u32,
}

impl RunResult {
    pub fn success(stdout: String, stderr: String, attempts: u32) -> Self {
        Self {
            status: RunStatus::Success,
            stdout,
            stderr,
            diagnostic: None,
            attempts,
        }
    }

    pub fn skipped(stdout: String, stderr: String, attempts: u32) -> Self {
        Self {
            status: RunStatus::Skipped,
            stdout,
            stderr,
            diagnostic: None,
            attempts,
        }
    }

    pub fn failed(
        stdout: String,
        stderr: String,
        diagnostic: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            status: RunStatus::Failed,
            stdout,
            stderr,
            diagnostic: Some(diagnostic.into()),
            attempts,
        }
    }

    /// Failure of the orchestrator's own machinery, not retried.
    pub fn infrastructure_failure(diagnostic: impl Into<String>, attempts: u32) -> Self {
        Self::failed(String::new(), String::new(), diagnostic, attempts)
    }

    /// Best available failure reason: diagnostic, then stderr.
    pub fn reason(&self) -> String {
        self.diagnostic
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| {
                let stderr = self.stderr.trim();
                (!stderr.is_empty()).then(|| stderr.to_string())
            })
            .unwrap_or_else(|| "unknown error".to_string())
    }
}
