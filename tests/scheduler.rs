// tests/scheduler.rs

mod common;
use crate::common::builders::{forced_spec, spec};

use dagrun::dag::{RunResult, Scheduler, StepSpec, StepStatus};

fn ok() -> RunResult {
    RunResult::success(String::new(), String::new(), 1)
}

fn failed() -> RunResult {
    RunResult::failed(String::new(), "boom".into(), "exit 1", 1)
}

fn skipped() -> RunResult {
    RunResult::skipped(String::new(), String::new(), 1)
}

/// Dispatch everything currently dispatchable, in order.
fn drain(scheduler: &mut Scheduler) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(s) = scheduler.next_dispatch() {
        out.push(s.name().to_string());
    }
    out
}

fn chain() -> Vec<StepSpec> {
    vec![spec("A", &[]), spec("B", &["A"]), spec("C", &["B"])]
}

#[test]
fn test_first_wave_is_all_roots() {
    let mut scheduler = Scheduler::from_specs(
        vec![spec("a", &[]), spec("b", &["a"]), spec("c", &[])],
        false,
    )
    .unwrap();
    assert_eq!(drain(&mut scheduler), ["a", "c"]);
    assert_eq!(scheduler.status_of("b"), Some(StepStatus::Pending));
}

#[test]
fn test_chain_success_dispatches_in_order() {
    let mut scheduler = Scheduler::from_specs(chain(), false).unwrap();
    for name in ["A", "B", "C"] {
        assert_eq!(drain(&mut scheduler), [name]);
        let step = scheduler.handle_completion(name, &ok());
        assert!(step.newly_skipped.is_empty());
        scheduler.end_batch();
    }
    assert!(scheduler.is_finished());
    let summary = scheduler.into_summary();
    assert_eq!(summary.succeeded, ["A", "B", "C"]);
    assert!(summary.is_success());
}

#[test]
fn test_skip_cascades_transitively() {
    let mut scheduler = Scheduler::from_specs(chain(), false).unwrap();
    assert_eq!(drain(&mut scheduler), ["A"]);

    let step = scheduler.handle_completion("A", &skipped());
    assert_eq!(step.newly_skipped, ["B", "C"]);
    assert!(step.newly_ready.is_empty());
    assert!(!scheduler.end_batch(), "skips never trigger abort");

    assert!(scheduler.is_finished());
    let summary = scheduler.into_summary();
    assert_eq!(summary.skipped, ["A", "B", "C"]);
    assert!(summary.not_run.is_empty());
    assert!(summary.is_success());
}

#[test]
fn test_step_force_runs_after_skipped_parent() {
    let specs = vec![spec("A", &[]), spec("B", &["A"]), forced_spec("C", &["B"])];
    let mut scheduler = Scheduler::from_specs(specs, false).unwrap();
    assert!(scheduler.force_any());

    drain(&mut scheduler);
    let step = scheduler.handle_completion("A", &skipped());
    assert_eq!(step.newly_skipped, ["B"]);
    assert_eq!(step.newly_forced, ["C"]);

    let dispatched = scheduler.next_dispatch().unwrap();
    assert_eq!(dispatched.name(), "C");
    let note = dispatched.forced.expect("forced note");
    assert!(note.contains("B=skipped"), "{note}");

    scheduler.handle_completion("C", &ok());
    let summary = scheduler.into_summary();
    assert_eq!(summary.skipped, ["A", "B"]);
    assert_eq!(summary.succeeded, ["C"]);
}

#[test]
fn test_failed_parent_skips_child_when_force_elsewhere() {
    // ingest -> transform -> publish, with force only on an unrelated step
    // so that the run is not aborted.
    let specs = vec![
        spec("ingest", &[]),
        spec("transform", &["ingest"]),
        spec("publish", &["transform"]),
        forced_spec("audit", &[]),
    ];
    let mut scheduler = Scheduler::from_specs(specs, false).unwrap();
    assert_eq!(drain(&mut scheduler), ["ingest", "audit"]);

    scheduler.handle_completion("ingest", &ok());
    scheduler.handle_completion("audit", &ok());
    assert!(!scheduler.end_batch());
    assert_eq!(drain(&mut scheduler), ["transform"]);

    let step = scheduler.handle_completion("transform", &failed());
    assert_eq!(step.newly_skipped, ["publish"]);
    assert!(!scheduler.end_batch(), "force_any suppresses abort");

    let summary = scheduler.into_summary();
    assert_eq!(summary.succeeded, ["ingest", "audit"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "transform");
    assert_eq!(summary.failed[0].1, "exit 1");
    assert_eq!(summary.skipped, ["publish"]);
    assert!(!summary.aborted);
}

#[test]
fn test_publish_forced_past_failed_ingest_names_skipped_transform() {
    let mut ingest = spec("ingest", &[]);
    ingest.retries = 3;
    let specs = vec![
        ingest,
        spec("transform", &["ingest"]),
        forced_spec("publish", &["transform"]),
    ];
    let mut scheduler = Scheduler::from_specs(specs, false).unwrap();
    assert_eq!(drain(&mut scheduler), ["ingest"]);

    let exhausted = RunResult::failed(
        String::new(),
        "boom".into(),
        "Step 'ingest' failed after 3 attempt(s). Last error: Return code 1.",
        3,
    );
    let step = scheduler.handle_completion("ingest", &exhausted);
    assert_eq!(step.newly_skipped, ["transform"]);
    assert_eq!(step.newly_forced, ["publish"]);
    assert!(!scheduler.end_batch(), "step-level force suppresses abort");

    let publish = scheduler.next_dispatch().expect("publish is dispatched");
    assert_eq!(publish.name(), "publish");
    let note = publish.forced.expect("forced note");
    assert!(note.contains("transform=skipped"), "{note}");

    scheduler.handle_completion("publish", &ok());
    let summary = scheduler.into_summary();
    assert_eq!(summary.failed_names().collect::<Vec<_>>(), ["ingest"]);
    assert!(summary.failed[0].1.contains("after 3 attempt(s)"));
    assert_eq!(summary.skipped, ["transform"]);
    assert_eq!(summary.succeeded, ["publish"]);
    assert!(!summary.aborted);
}

#[test]
fn test_global_force_runs_children_of_failures() {
    let mut scheduler = Scheduler::from_specs(chain(), true).unwrap();
    drain(&mut scheduler);
    let step = scheduler.handle_completion("A", &failed());
    assert_eq!(step.newly_forced, ["B"]);
    assert!(!scheduler.end_batch());
    assert_eq!(drain(&mut scheduler), ["B"]);
}

#[test]
fn test_failure_without_force_aborts_and_withholds_dispatch() {
    // a fails while b is still in flight; c and d are ready or pending.
    let specs = vec![
        spec("a", &[]),
        spec("b", &[]),
        spec("c", &["b"]),
        spec("d", &["a"]),
    ];
    let mut scheduler = Scheduler::from_specs(specs, false).unwrap();
    assert_eq!(drain(&mut scheduler), ["a", "b"]);

    let step = scheduler.handle_completion("a", &failed());
    assert_eq!(step.newly_skipped, ["d"]);
    assert!(scheduler.end_batch());
    assert!(scheduler.is_aborted());

    // b still finishes and is recorded, but c is never handed out.
    let step = scheduler.handle_completion("b", &ok());
    assert_eq!(step.newly_ready, ["c"]);
    assert!(scheduler.next_dispatch().is_none());
    assert!(scheduler.is_finished());

    let summary = scheduler.into_summary();
    assert!(summary.aborted);
    assert!(!summary.is_success());
    assert_eq!(summary.succeeded, ["b"]);
    assert_eq!(summary.skipped, ["d"]);
    assert_eq!(summary.not_run, ["c"]);
}

#[test]
fn test_step_is_dispatched_at_most_once() {
    let mut scheduler = Scheduler::from_specs(
        vec![spec("a", &[]), spec("b", &[]), spec("c", &["a", "b"])],
        false,
    )
    .unwrap();
    drain(&mut scheduler);
    scheduler.handle_completion("a", &ok());
    assert!(scheduler.next_dispatch().is_none(), "c waits for b");
    scheduler.handle_completion("b", &ok());
    assert_eq!(drain(&mut scheduler), ["c"]);

    // A duplicate completion for a step that is no longer running is ignored.
    let step = scheduler.handle_completion("a", &failed());
    assert!(step.newly_ready.is_empty());
    assert!(drain(&mut scheduler).is_empty());
    scheduler.handle_completion("c", &ok());
    let summary = scheduler.into_summary();
    assert!(summary.failed.is_empty());
    assert_eq!(summary.succeeded, ["a", "b", "c"]);
}

#[test]
fn test_diamond_with_one_failed_branch_skips_join() {
    let specs = vec![
        spec("root", &[]),
        spec("left", &["root"]),
        spec("right", &["root"]),
        spec("join", &["left", "right"]),
        forced_spec("side", &[]),
    ];
    let mut scheduler = Scheduler::from_specs(specs, false).unwrap();
    drain(&mut scheduler);
    scheduler.handle_completion("root", &ok());
    scheduler.handle_completion("side", &ok());
    assert_eq!(drain(&mut scheduler), ["left", "right"]);

    let step = scheduler.handle_completion("left", &failed());
    assert!(step.newly_skipped.is_empty(), "join still waits for right");
    let step = scheduler.handle_completion("right", &ok());
    assert_eq!(step.newly_skipped, ["join"]);
    assert!(scheduler.is_finished());
}
