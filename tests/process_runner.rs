// tests/process_runner.rs
#![cfg(unix)]

mod common;
use crate::common::recording_sink::RecordingSink;
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use dagrun::dag::{Invocation, RunStatus, StepSpec};
use dagrun::exec::{ProcessOptions, ProcessRunner, StepRunner};
use dagrun::types::LogLevel;

fn runner(sink: &Arc<RecordingSink>) -> ProcessRunner {
    ProcessRunner::new(
        ProcessOptions {
            retry_delay: Duration::from_millis(10),
            ..ProcessOptions::default()
        },
        Arc::clone(sink) as Arc<dyn dagrun::logging::LogSink>,
    )
}

fn shell_step(name: &str, script: &str) -> StepSpec {
    StepSpec::new(name, Invocation::new("sh").arg("-c").arg(script))
}

fn attempts_in(dir: &TempDir) -> usize {
    std::fs::read_to_string(dir.path().join("attempts"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_success_captures_stdout() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let result = with_timeout(runner(&sink).run(shell_step("hello", "echo hello world"))).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.stdout, "hello world\n");
    assert_eq!(sink.messages_at("hello", LogLevel::Info), ["hello world"]);
}

#[tokio::test]
async fn test_always_failing_step_uses_every_attempt() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let script = format!(
        "echo x >> '{}'; echo 'disk on fire' >&2; exit 3",
        dir.path().join("attempts").display()
    );
    let mut step = shell_step("flaky", &script);
    step.retries = 3;

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 3);
    assert_eq!(attempts_in(&dir), 3);
    let reason = result.reason();
    assert!(reason.contains("failed after 3 attempt(s)"), "{reason}");
    assert!(reason.contains("Return code 3"), "{reason}");
    assert!(reason.contains("disk on fire"), "{reason}");
}

#[tokio::test]
async fn test_retry_recovers_on_later_attempt() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let counter = dir.path().join("attempts");
    let script = format!(
        "echo x >> '{p}'; [ $(( $(wc -l < '{p}') )) -ge 2 ]",
        p = counter.display()
    );
    let mut step = shell_step("recovering", &script);
    step.retries = 5;

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.attempts, 2);
    assert_eq!(attempts_in(&dir), 2);
}

#[tokio::test]
async fn test_skip_payload_is_not_retried() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let script = format!(
        "echo x >> '{}'; echo 'nothing to do'; echo '{{\"skipped\": true}}'",
        dir.path().join("attempts").display()
    );
    let mut step = shell_step("idle", &script);
    step.retries = 3;

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Skipped);
    assert_eq!(result.attempts, 1);
    assert_eq!(attempts_in(&dir), 1);
}

#[tokio::test]
async fn test_success_false_payload_counts_as_failed_attempt() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let mut step = shell_step("liar", "echo '{\"success\": false}'");
    step.retries = 2;

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 2);
    assert!(result.reason().contains("success=false"));
}

#[tokio::test]
async fn test_stderr_is_classified_line_by_line() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let script = "echo 'plain note' >&2; echo '[INFO] progress 50%' >&2; \
                  printf 'Traceback (most recent call last):\\n  File \"t.py\"\\nKeyError: k\\n' >&2; \
                  exit 1";
    let result = with_timeout(runner(&sink).run(shell_step("noisy", script))).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(sink.messages_at("noisy", LogLevel::Warning), ["plain note"]);
    assert_eq!(sink.messages_at("noisy", LogLevel::Info), ["[INFO] progress 50%"]);
    let errors = sink.messages_at("noisy", LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Traceback"));
    assert!(errors[0].ends_with("KeyError: k"));
}

#[tokio::test]
async fn test_environment_is_forwarded() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let step = StepSpec::new(
        "env",
        Invocation::new("sh")
            .arg("-c")
            .arg("echo \"dir=$PROJECT_DIR\"")
            .env("PROJECT_DIR", "/srv/project"),
    );

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Success);
    assert!(sink.contains("env", "dir=/srv/project"));
}

#[tokio::test]
async fn test_timeout_fails_the_attempt() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let mut step = shell_step("sleepy", "exec sleep 5");
    step.timeout = Some(Duration::from_secs(1));

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert!(result.reason().contains("timed out after 1s"), "{}", result.reason());
}

#[tokio::test]
async fn test_timeout_kills_processes_started_by_the_step() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    // `sleep` runs as a child of the shell and holds both pipes open.
    let mut step = shell_step("pipeline", "sleep 8; echo done");
    step.timeout = Some(Duration::from_secs(1));

    let started = Instant::now();
    let result = with_timeout(runner(&sink).run(step)).await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.reason().contains("timed out after 1s"), "{}", result.reason());
    assert!(elapsed < Duration::from_secs(4), "attempt took {elapsed:?}");
    assert!(!sink.contains("pipeline", "done"));
}

#[tokio::test]
async fn test_background_descendant_does_not_hold_the_step() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let step = shell_step("daemonish", "sleep 8 & echo started");

    let started = Instant::now();
    let result = with_timeout(runner(&sink).run(step)).await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.stdout, "started\n");
    assert!(elapsed < Duration::from_secs(6), "attempt took {elapsed:?}");
}

#[tokio::test]
async fn test_spawn_failure_is_not_retried() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let mut step = StepSpec::new(
        "missing",
        Invocation::new("/definitely/not/a/real/interpreter").arg("x.py"),
    );
    step.retries = 4;

    let result = with_timeout(runner(&sink).run(step)).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert!(result.reason().starts_with("Unexpected error"), "{}", result.reason());
}
