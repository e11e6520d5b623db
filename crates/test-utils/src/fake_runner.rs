use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dagrun::dag::{RunResult, RunStatus, StepSpec};
use dagrun::exec::StepRunner;

/// A fake runner that:
/// - records which steps were run, in start order
/// - reports a scripted status per step (default `Success`)
/// - optionally holds each step for a fixed delay, tracking peak concurrency
#[derive(Default)]
pub struct FakeRunner {
    outcomes: HashMap<String, RunStatus>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    started: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, step: &str, status: RunStatus) -> Self {
        self.outcomes.insert(step.to_string(), status);
        self
    }

    pub fn failing(self, step: &str) -> Self {
        self.with_outcome(step, RunStatus::Failed)
    }

    pub fn skipping(self, step: &str) -> Self {
        self.with_outcome(step, RunStatus::Skipped)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_step_delay(mut self, step: &str, delay: Duration) -> Self {
        self.delays.insert(step.to_string(), delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Steps in the order they were started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn was_run(&self, step: &str) -> bool {
        self.started.lock().unwrap().iter().any(|s| s == step)
    }

    pub fn run_count(&self, step: &str) -> usize {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == step)
            .count()
    }

    /// Highest number of steps observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl StepRunner for FakeRunner {
    fn run(&self, step: StepSpec) -> Pin<Box<dyn Future<Output = RunResult> + Send + '_>> {
        Box::pin(async move {
            self.started.lock().unwrap().push(step.name.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self
                .delays
                .get(&step.name)
                .copied()
                .unwrap_or(self.default_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self
                .outcomes
                .get(&step.name)
                .copied()
                .unwrap_or(RunStatus::Success)
            {
                RunStatus::Success => RunResult::success(String::new(), String::new(), 1),
                RunStatus::Skipped => RunResult::skipped(String::new(), String::new(), 1),
                RunStatus::Failed => RunResult::failed(
                    String::new(),
                    format!("{} exploded", step.name),
                    format!("step '{}' scripted to fail", step.name),
                    1,
                ),
            }
        })
    }
}
