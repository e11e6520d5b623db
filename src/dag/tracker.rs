// src/dag/tracker.rs

//! Accumulates terminal statuses and produces the run summary.

use crate::dag::status::RunStatus;
use crate::dag::step::StepName;

/// Final report of one run.
///
/// Each list is in the order statuses were recorded. `not_run` holds steps
/// that never reached a terminal status because the abort policy withheld
/// their dispatch; they were not skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<StepName>,
    pub skipped: Vec<StepName>,
    pub failed: Vec<(StepName, String)>,
    pub not_run: Vec<StepName>,
    pub aborted: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }

    pub fn failed_names(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(name, _)| name.as_str())
    }

    /// Final status of `name`, or `None` if it never reached one.
    pub fn status_of(&self, name: &str) -> Option<RunStatus> {
        if self.succeeded.iter().any(|n| n == name) {
            Some(RunStatus::Success)
        } else if self.skipped.iter().any(|n| n == name) {
            Some(RunStatus::Skipped)
        } else if self.failed_names().any(|n| n == name) {
            Some(RunStatus::Failed)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    summary: RunSummary,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal status. `reason` is only kept for failures.
    pub fn record(&mut self, name: &str, status: RunStatus, reason: impl Into<String>) {
        match status {
            RunStatus::Success => self.summary.succeeded.push(name.to_string()),
            RunStatus::Skipped => self.summary.skipped.push(name.to_string()),
            RunStatus::Failed => self
                .summary
                .failed
                .push((name.to_string(), reason.into())),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.summary.failed.is_empty()
    }

    pub fn finish(mut self, not_run: Vec<StepName>, aborted: bool) -> RunSummary {
        self.summary.not_run = not_run;
        self.summary.aborted = aborted;
        self.summary
    }
}
