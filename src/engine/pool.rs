// src/engine/pool.rs

//! Bounded worker pool with a single completion channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::dag::{RunResult, ScheduledStep};
use crate::exec::StepRunner;

use super::Completion;

/// Runs at most `max_workers` steps at a time.
///
/// Every worker reports back over one mpsc channel read only by the
/// coordinator. A worker whose step future panics still reports a `Failed`
/// completion.
pub struct WorkerPool<R: StepRunner> {
    runner: Arc<R>,
    max_workers: usize,
    in_flight: usize,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
}

impl<R: StepRunner> WorkerPool<R> {
    pub fn new(runner: Arc<R>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        let (tx, rx) = mpsc::channel::<Completion>(max_workers);
        Self {
            runner,
            max_workers,
            in_flight: 0,
            tx,
            rx,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.max_workers
    }

    /// Start `scheduled` on a free worker slot.
    ///
    /// Callers must check [`Self::has_capacity`] first.
    pub fn spawn(&mut self, scheduled: ScheduledStep) {
        debug_assert!(self.has_capacity(), "worker pool over capacity");

        let runner = Arc::clone(&self.runner);
        let tx = self.tx.clone();
        let name = scheduled.spec.name.clone();
        let spec = scheduled.spec;

        tokio::spawn(async move {
            let worker = tokio::spawn(async move { runner.run(spec).await });

            let result = match worker.await {
                Ok(result) => result,
                Err(err) => {
                    error!(step = %name, error = %err, "step worker failed");
                    RunResult::infrastructure_failure(
                        format!("worker for step '{name}' failed: {err}"),
                        0,
                    )
                }
            };

            if tx.send(Completion { step: name, result }).await.is_err() {
                debug!("completion channel closed before step result was delivered");
            }
        });

        self.in_flight += 1;
        debug!(
            in_flight = self.in_flight,
            max_workers = self.max_workers,
            "worker slot taken"
        );
    }

    /// Wait for the next completion. `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(completion)
    }

    /// A completion that is already available, without waiting.
    pub fn try_next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.rx.try_recv().ok()?;
        self.in_flight -= 1;
        Some(completion)
    }
}
