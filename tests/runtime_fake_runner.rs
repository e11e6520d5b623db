// tests/runtime_fake_runner.rs

mod common;
use crate::common::builders::{forced_spec, spec};
use crate::common::fake_runner::FakeRunner;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use dagrun::dag::{RunStatus, StepSpec};
use dagrun::engine::{PipelineRuntime, RunOptions};
use dagrun::errors::DagrunError;
use dagrun::types::ExecutionMode;

type TestResult = Result<(), Box<dyn Error>>;

fn parallel(max_workers: usize) -> RunOptions {
    RunOptions {
        mode: ExecutionMode::Parallel,
        max_workers,
        global_force: false,
    }
}

fn runtime(runner: &Arc<FakeRunner>, options: RunOptions) -> PipelineRuntime<FakeRunner> {
    PipelineRuntime::with_shared_runner(Arc::clone(runner), options)
}

/// ddl -> {preprocess, train} -> inference
fn ml_specs() -> Vec<StepSpec> {
    vec![
        spec("ddl", &[]),
        spec("preprocess", &["ddl"]),
        spec("train", &["ddl"]),
        spec("inference", &["preprocess", "train"]),
    ]
}

#[tokio::test]
async fn test_parallel_run_respects_dependencies() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().shared();
    let summary = with_timeout(runtime(&runner, parallel(4)).run(ml_specs())).await?;

    assert!(summary.is_success());
    assert_eq!(summary.succeeded.len(), 4);

    let started = runner.started();
    assert_eq!(started.first().map(String::as_str), Some("ddl"));
    assert_eq!(started.last().map(String::as_str), Some("inference"));
    Ok(())
}

#[tokio::test]
async fn test_independent_roots_start_in_first_wave() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new()
        .with_delay(Duration::from_millis(50))
        .shared();
    let specs = vec![spec("a", &[]), spec("b", &[]), spec("c", &["a"])];
    with_timeout(runtime(&runner, parallel(4)).run(specs)).await?;

    let started = runner.started();
    assert_eq!(&started[..2], ["a", "b"]);
    assert_eq!(runner.peak_concurrency(), 2);
    Ok(())
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new()
        .with_delay(Duration::from_millis(30))
        .shared();
    let specs: Vec<StepSpec> = (0..6).map(|i| spec(&format!("s{i}"), &[])).collect();

    let summary = with_timeout(runtime(&runner, parallel(2)).run(specs)).await?;

    assert_eq!(summary.succeeded.len(), 6);
    assert!(runner.peak_concurrency() <= 2, "peak {}", runner.peak_concurrency());
    Ok(())
}

#[tokio::test]
async fn test_skipped_step_children_are_never_invoked() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().skipping("ddl").shared();
    let summary = with_timeout(runtime(&runner, parallel(4)).run(ml_specs())).await?;

    assert_eq!(runner.started(), ["ddl"]);
    assert_eq!(summary.skipped, ["ddl", "preprocess", "train", "inference"]);
    assert!(summary.is_success());
    Ok(())
}

#[tokio::test]
async fn test_forced_step_runs_after_failed_dependency() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().failing("train").shared();
    let specs = vec![
        spec("ddl", &[]),
        spec("preprocess", &["ddl"]),
        spec("train", &["ddl"]),
        forced_spec("inference", &["preprocess", "train"]),
    ];
    let summary = with_timeout(runtime(&runner, parallel(4)).run(specs)).await?;

    assert!(runner.was_run("inference"));
    assert_eq!(summary.failed_names().collect::<Vec<_>>(), ["train"]);
    assert!(summary.succeeded.contains(&"inference".to_string()));
    assert!(!summary.aborted);
    assert!(!summary.is_success());
    Ok(())
}

#[tokio::test]
async fn test_forced_publish_runs_after_failed_ingest_and_skipped_transform() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().failing("ingest").shared();
    let mut ingest = spec("ingest", &[]);
    ingest.retries = 3;
    let specs = vec![
        ingest,
        spec("transform", &["ingest"]),
        forced_spec("publish", &["transform"]),
    ];

    let summary = with_timeout(runtime(&runner, parallel(4)).run(specs)).await?;

    assert_eq!(summary.status_of("ingest"), Some(RunStatus::Failed));
    assert_eq!(summary.status_of("transform"), Some(RunStatus::Skipped));
    assert_eq!(summary.status_of("publish"), Some(RunStatus::Success));
    assert_eq!(runner.started(), ["ingest", "publish"]);
    assert!(!runner.was_run("transform"));
    assert!(!summary.aborted);
    assert!(summary.not_run.is_empty());
    assert!(!summary.is_success());
    Ok(())
}

#[tokio::test]
async fn test_failure_aborts_without_force() -> TestResult {
    init_tracing();
    // `slow` is in flight when `fast` fails; its child must never start.
    let runner = FakeRunner::new()
        .failing("fast")
        .with_step_delay("slow", Duration::from_millis(100))
        .shared();
    let specs = vec![
        spec("fast", &[]),
        spec("slow", &[]),
        spec("after_slow", &["slow"]),
    ];
    let summary = with_timeout(runtime(&runner, parallel(4)).run(specs)).await?;

    assert!(summary.aborted);
    assert_eq!(summary.succeeded, ["slow"]);
    assert_eq!(summary.not_run, ["after_slow"]);
    assert!(!runner.was_run("after_slow"));
    Ok(())
}

#[tokio::test]
async fn test_sequential_runs_every_step_in_declaration_order() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().failing("ddl").shared();
    let options = RunOptions {
        mode: ExecutionMode::Sequential,
        ..parallel(4)
    };
    let summary = with_timeout(runtime(&runner, options).run(ml_specs())).await?;

    assert_eq!(runner.started(), ["ddl", "preprocess", "train", "inference"]);
    assert_eq!(runner.peak_concurrency(), 1);
    assert_eq!(summary.failed_names().collect::<Vec<_>>(), ["ddl"]);
    assert_eq!(summary.succeeded, ["preprocess", "train", "inference"]);
    assert!(summary.skipped.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_single_step_ignores_dependencies() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().shared();
    let summary =
        with_timeout(runtime(&runner, parallel(4)).run_single(ml_specs(), "inference")).await?;

    assert_eq!(runner.started(), ["inference"]);
    assert_eq!(summary.succeeded, ["inference"]);
    Ok(())
}

#[tokio::test]
async fn test_single_unknown_step_is_an_error() {
    init_tracing();
    let runner = FakeRunner::new().shared();
    let err = runtime(&runner, parallel(4))
        .run_single(ml_specs(), "deploy")
        .await
        .unwrap_err();

    assert!(matches!(err, DagrunError::UnknownStep(ref name) if name == "deploy"));
    assert!(runner.started().is_empty());
}

#[tokio::test]
async fn test_invalid_graph_fails_before_anything_runs() {
    init_tracing();
    let runner = FakeRunner::new().shared();
    let specs = vec![spec("a", &["b"]), spec("b", &["a"])];
    let err = runtime(&runner, parallel(4)).run(specs).await.unwrap_err();

    assert!(matches!(err, DagrunError::DagCycle(_)));
    assert!(runner.started().is_empty());
}
