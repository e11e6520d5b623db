use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, error, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler_step::{ScheduledStep, SchedulerStep};
use crate::dag::status::{RunResult, RunStatus, StepStatus};
use crate::dag::step::{StepName, StepSpec};
use crate::dag::tracker::{RunSummary, StatusTracker};
use crate::errors::{DagrunError, Result};

/// Scheduler holds the immutable DAG plus the mutable state of one run.
///
/// It is a pure state machine: it never spawns anything. The engine asks it
/// for dispatchable steps and feeds completions back. It is responsible for:
/// - seeding the ready queue with every root
/// - counting down in-degrees as parents reach a terminal status
/// - deciding, once a child's parents are all terminal, whether it becomes
///   `Ready`, is forced to run, or is cascade-skipped
/// - the abort policy: with no force anywhere, the first failure stops all
///   further dispatch
#[derive(Debug)]
pub struct Scheduler {
    graph: DependencyGraph,
    specs: HashMap<StepName, StepSpec>,
    /// In-degree countdown for this run.
    remaining: HashMap<StepName, usize>,
    status: HashMap<StepName, StepStatus>,
    ready: VecDeque<StepName>,
    /// Steps that became ready through force, with the override note.
    forced: HashMap<StepName, String>,
    global_force: bool,
    force_any: bool,
    aborted: bool,
    tracker: StatusTracker,
}

impl Scheduler {
    /// Build the graph from `specs` and seed the first wave.
    pub fn from_specs(specs: Vec<StepSpec>, global_force: bool) -> Result<Self> {
        let graph = DependencyGraph::build(&specs)?;
        Ok(Self::new(graph, specs, global_force))
    }

    /// `graph` must have been built from `specs`.
    pub fn new(graph: DependencyGraph, specs: Vec<StepSpec>, global_force: bool) -> Self {
        let force_any = global_force || specs.iter().any(|s| s.force);

        let remaining = graph
            .steps()
            .map(|name| (name.to_string(), graph.in_degree(name)))
            .collect();
        let status = graph
            .steps()
            .map(|name| (name.to_string(), StepStatus::Pending))
            .collect();
        let specs = specs.into_iter().map(|s| (s.name.clone(), s)).collect();

        let mut scheduler = Self {
            graph,
            specs,
            remaining,
            status,
            ready: VecDeque::new(),
            forced: HashMap::new(),
            global_force,
            force_any,
            aborted: false,
            tracker: StatusTracker::new(),
        };

        for root in scheduler.graph.roots() {
            scheduler.set_status(&root, StepStatus::Ready);
            scheduler.ready.push_back(root);
        }

        debug!(
            roots = ?scheduler.ready,
            force_any,
            "scheduler: seeded first wave"
        );

        scheduler
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// `global_force` or any step-level force flag.
    pub fn force_any(&self) -> bool {
        self.force_any
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.status.get(name).copied()
    }

    /// Names of steps currently dispatched to a worker.
    pub fn running(&self) -> Vec<StepName> {
        self.graph
            .steps()
            .filter(|n| self.status_of(n) == Some(StepStatus::Running))
            .map(|n| n.to_string())
            .collect()
    }

    pub fn has_running(&self) -> bool {
        self.status.values().any(|s| *s == StepStatus::Running)
    }

    /// Whether [`Self::next_dispatch`] would return a step.
    pub fn has_dispatchable(&self) -> bool {
        !self.aborted
            && self
                .ready
                .iter()
                .any(|n| self.status_of(n) == Some(StepStatus::Ready))
    }

    /// A run is finished when nothing is running and nothing more can be
    /// dispatched.
    pub fn is_finished(&self) -> bool {
        !self.has_running() && !self.has_dispatchable()
    }

    /// Pop the next ready step and mark it `Running`.
    ///
    /// Returns `None` once the abort policy has fired, so no step is ever
    /// submitted past that point. A step is handed out at most once.
    pub fn next_dispatch(&mut self) -> Option<ScheduledStep> {
        if self.aborted {
            return None;
        }

        while let Some(name) = self.ready.pop_front() {
            if self.status_of(&name) != Some(StepStatus::Ready) {
                debug!(step = %name, "scheduler: dropping stale ready entry");
                continue;
            }
            let Some(spec) = self.specs.get(&name).cloned() else {
                warn!(step = %name, "scheduler: ready step has no spec; ignoring");
                continue;
            };

            self.set_status(&name, StepStatus::Running);
            info!(step = %name, "dispatching step");

            return Some(ScheduledStep {
                forced: self.forced.get(&name).cloned(),
                spec,
            });
        }

        None
    }

    /// Record the terminal result of a dispatched step and propagate
    /// readiness to its children.
    pub fn handle_completion(&mut self, name: &str, result: &RunResult) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        match self.status_of(name) {
            Some(StepStatus::Running) => {}
            Some(other) => {
                warn!(
                    step = %name,
                    status = %other,
                    "completion for a step that is not running; ignoring"
                );
                return step;
            }
            None => {
                warn!(step = %name, "completion for unknown step; ignoring");
                return step;
            }
        }

        match result.status {
            RunStatus::Success => {
                info!(step = %name, attempts = result.attempts, "step completed");
                self.tracker.record(name, RunStatus::Success, "");
            }
            RunStatus::Skipped => {
                warn!(step = %name, "step was skipped");
                self.tracker.record(name, RunStatus::Skipped, "");
            }
            RunStatus::Failed => {
                let reason = result.reason();
                error!(step = %name, attempts = result.attempts, reason = %reason, "step failed");
                self.tracker.record(name, RunStatus::Failed, reason);
            }
        }
        self.set_status(name, result.status.into());

        self.release_children(name, &mut step);
        step
    }

    /// Apply the abort policy after a batch of completions.
    ///
    /// Returns `true` if the run is (now) aborted.
    pub fn end_batch(&mut self) -> bool {
        if !self.aborted && !self.force_any && self.tracker.has_failures() {
            self.aborted = true;
            let withheld: Vec<&str> = self
                .graph
                .steps()
                .filter(|n| !self.status_of(n).is_some_and(StepStatus::is_terminal))
                .filter(|n| self.status_of(n) != Some(StepStatus::Running))
                .collect();
            error!(
                ?withheld,
                "aborting DAG execution due to failure (force mode is off)"
            );
        }
        self.aborted
    }

    /// Consume the scheduler and produce the run report.
    pub fn into_summary(self) -> RunSummary {
        let not_run: Vec<StepName> = self
            .graph
            .steps()
            .filter(|n| !self.status_of(n).is_some_and(StepStatus::is_terminal))
            .map(|n| n.to_string())
            .collect();
        if !not_run.is_empty() {
            warn!(?not_run, "steps never ran in this DAG run");
        }
        self.tracker.finish(not_run, self.aborted)
    }

    fn set_status(&mut self, name: &str, status: StepStatus) {
        if let Some(slot) = self.status.get_mut(name) {
            *slot = status;
        }
    }

    /// Decrement the in-degree of every child of `parent`; evaluate each
    /// child whose countdown reaches zero. Cascade skips are treated like
    /// completions and propagate further down.
    fn release_children(&mut self, parent: &str, step: &mut SchedulerStep) {
        let mut stack: Vec<StepName> = vec![parent.to_string()];
        let mut visited: HashSet<StepName> = HashSet::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }

            let children = self.graph.children_of(&current).to_vec();
            for child in children {
                let reached_zero = match self.remaining.get_mut(&child) {
                    Some(rem) if *rem > 0 => {
                        *rem -= 1;
                        *rem == 0
                    }
                    _ => {
                        warn!(step = %child, "in-degree already zero; ignoring extra release");
                        false
                    }
                };
                if !reached_zero {
                    continue;
                }

                if self.status_of(&child) != Some(StepStatus::Pending) {
                    warn!(step = %child, "child released twice; ignoring");
                    continue;
                }

                if self.evaluate_readiness(&child, step) == StepStatus::Skipped {
                    stack.push(child);
                }
            }
        }
    }

    /// Readiness test for a child whose parents are all terminal.
    fn evaluate_readiness(&mut self, child: &str, step: &mut SchedulerStep) -> StepStatus {
        let all_parents_succeeded = self
            .graph
            .parents_of(child)
            .iter()
            .all(|p| self.status_of(p) == Some(StepStatus::Success));

        if all_parents_succeeded {
            debug!(step = %child, "dependencies succeeded; marking Ready");
            self.set_status(child, StepStatus::Ready);
            self.ready.push_back(child.to_string());
            step.newly_ready.push(child.to_string());
            return StepStatus::Ready;
        }

        let parents = self.format_parent_statuses(child);
        let step_force = self.specs.get(child).is_some_and(|s| s.force);

        if self.global_force || step_force {
            let note = format!("running despite non-success dependencies (parents: {parents})");
            warn!(
                step = %child,
                parents = %parents,
                global_force = self.global_force,
                step_force,
                "forcing run of step"
            );
            self.forced.insert(child.to_string(), note);
            self.set_status(child, StepStatus::Ready);
            self.ready.push_back(child.to_string());
            step.newly_ready.push(child.to_string());
            step.newly_forced.push(child.to_string());
            return StepStatus::Ready;
        }

        warn!(
            step = %child,
            parents = %parents,
            "skipping step due to non-success dependency; force is off"
        );
        self.set_status(child, StepStatus::Skipped);
        self.tracker.record(child, RunStatus::Skipped, "");
        step.newly_skipped.push(child.to_string());
        StepStatus::Skipped
    }

    fn format_parent_statuses(&self, child: &str) -> String {
        let parents = self.graph.parents_of(child);
        if parents.is_empty() {
            return "(no-parents)".to_string();
        }
        parents
            .iter()
            .map(|p| {
                let status = self.status_of(p).unwrap_or(StepStatus::Pending);
                format!("{p}={status}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Surface a scheduler invariant violation as an infrastructure error.
pub(crate) fn stalled_error(scheduler: &Scheduler) -> DagrunError {
    DagrunError::Infrastructure(format!(
        "scheduler stalled with running steps {:?} but no worker in flight",
        scheduler.running()
    ))
}
