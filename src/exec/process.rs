// src/exec/process.rs

//! Subprocess step runner.

use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::{RunResult, StepSpec};
use crate::exec::backend::StepRunner;
use crate::exec::classifier::LineClassifier;
use crate::exec::payload::parse_payload;
use crate::logging::{LogSink, StepLog};
use crate::types::LogLevel;

/// Number of trailing stderr lines quoted in an attempt failure reason.
const STDERR_TAIL_LINES: usize = 5;

/// How long output readers may outlive the step process.
const READER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// Fixed pause between a failed attempt and the next one.
    pub retry_delay: Duration,
    /// Level for unclassified stderr lines.
    pub stderr_level: LogLevel,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            stderr_level: LogLevel::Warning,
        }
    }
}

/// Runs each step as a child process, classifying both output streams live.
pub struct ProcessRunner {
    options: ProcessOptions,
    sink: Arc<dyn LogSink>,
}

impl ProcessRunner {
    pub fn new(options: ProcessOptions, sink: Arc<dyn LogSink>) -> Self {
        Self { options, sink }
    }

    /// Attempt the step up to `step.retries` times.
    ///
    /// - A skip payload ends the loop immediately and is never retried.
    /// - A non-zero exit, a `success: false` payload or a timeout consumes
    ///   one attempt.
    /// - A machinery error (spawn, stream read, wait) fails the step at
    ///   once without retrying.
    pub async fn execute(&self, step: StepSpec) -> RunResult {
        let log = StepLog::new(&step.name, Arc::clone(&self.sink));
        let retries = step.retries.max(1);

        info!(
            step = %step.name,
            retries,
            cmd = %step.invocation,
            "starting step"
        );

        let mut last: Option<AttemptOutput> = None;
        let mut last_reason = String::new();

        for attempt in 1..=retries {
            let output = match run_attempt(&step, &log, self.options.stderr_level).await {
                Ok(output) => output,
                Err(err) => {
                    error!(
                        step = %step.name,
                        attempt,
                        error = %format!("{err:#}"),
                        "unexpected error while executing step"
                    );
                    return RunResult::infrastructure_failure(
                        format!("Unexpected error: {err:#}"),
                        attempt,
                    );
                }
            };

            match evaluate_attempt(&output) {
                Verdict::Skipped => {
                    warn!(step = %step.name, attempt, "step reported skip");
                    return RunResult::skipped(output.stdout, output.stderr, attempt);
                }
                Verdict::Succeeded => {
                    info!(step = %step.name, attempt, "step succeeded");
                    return RunResult::success(output.stdout, output.stderr, attempt);
                }
                Verdict::Failed(reason) => {
                    error!(
                        step = %step.name,
                        attempt,
                        retries,
                        reason = %reason,
                        "step attempt failed"
                    );
                    last_reason = reason;
                    last = Some(output);
                    if attempt < retries {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }

        let (stdout, stderr) = last.map(|o| (o.stdout, o.stderr)).unwrap_or_default();
        RunResult::failed(
            stdout,
            stderr,
            format!(
                "Step '{}' failed after {} attempt(s). Last error: {}",
                step.name, retries, last_reason
            ),
            retries,
        )
    }
}

impl StepRunner for ProcessRunner {
    fn run(&self, step: StepSpec) -> Pin<Box<dyn Future<Output = RunResult> + Send + '_>> {
        Box::pin(self.execute(step))
    }
}

/// Everything observed from one attempt.
#[derive(Debug, Clone)]
struct AttemptOutput {
    /// `None` when the attempt was killed on timeout.
    status: Option<ExitStatus>,
    timeout: Option<Duration>,
    stdout: String,
    stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Succeeded,
    Skipped,
    Failed(String),
}

fn evaluate_attempt(output: &AttemptOutput) -> Verdict {
    let Some(status) = output.status else {
        let secs = output.timeout.map(|t| t.as_secs()).unwrap_or(0);
        return Verdict::Failed(format!("timed out after {secs}s"));
    };

    if status.success() {
        return match parse_payload(&output.stdout) {
            Some(payload) if payload.skipped => Verdict::Skipped,
            Some(payload) if payload.reports_failure() => {
                Verdict::Failed("step reported success=false".to_string())
            }
            _ => Verdict::Succeeded,
        };
    }

    let code = status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string());
    let tail = stderr_tail(&output.stderr);
    if tail.is_empty() {
        Verdict::Failed(format!("Return code {code}."))
    } else {
        Verdict::Failed(format!("Return code {code}. stderr: {tail}"))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

async fn run_attempt(
    step: &StepSpec,
    log: &StepLog,
    stderr_level: LogLevel,
) -> Result<AttemptOutput> {
    let inv = &step.invocation;
    debug!(step = %step.name, cmd = %inv, "spawning step process");

    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .envs(inv.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a timeout reaches everything the step started.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for step '{}'", step.name))?;
    let pgid = child.id();

    let stdout = child
        .stdout
        .take()
        .with_context(|| format!("stdout of step '{}' was not captured", step.name))?;
    let stderr = child
        .stderr
        .take()
        .with_context(|| format!("stderr of step '{}' was not captured", step.name))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let stdout_task = tokio::spawn(drain_stream(
        stdout,
        LineClassifier::new(LogLevel::Info),
        log.clone(),
        stop_rx.clone(),
    ));
    let stderr_task = tokio::spawn(drain_stream(
        stderr,
        LineClassifier::new(stderr_level),
        log.clone(),
        stop_rx,
    ));

    let status = match step.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(res) => Some(res.with_context(|| {
                format!("waiting for process of step '{}'", step.name)
            })?),
            Err(_) => {
                warn!(
                    step = %step.name,
                    timeout_secs = limit.as_secs(),
                    "step attempt timed out; killing process group"
                );
                kill_process_group(pgid, &step.name).await;
                if let Err(e) = child.kill().await {
                    warn!(step = %step.name, error = %e, "failed to kill timed-out process");
                }
                None
            }
        },
        None => Some(
            child
                .wait()
                .await
                .with_context(|| format!("waiting for process of step '{}'", step.name))?,
        ),
    };

    let stdout = join_reader(stdout_task, &stop_tx, "stdout", &step.name).await?;
    let stderr = join_reader(stderr_task, &stop_tx, "stderr", &step.name).await?;

    info!(
        step = %step.name,
        exit_code = status.and_then(|s| s.code()),
        success = status.is_some_and(|s| s.success()),
        "step process exited"
    );

    Ok(AttemptOutput {
        status,
        timeout: step.timeout,
        stdout,
        stderr,
    })
}

/// Wait for a reader after the process is gone.
///
/// A descendant that outlived the step can keep the pipe open; after
/// [`READER_GRACE`] the readers are told to stop, and aborted if even that
/// does not end them.
async fn join_reader(
    mut task: JoinHandle<std::io::Result<String>>,
    stop: &watch::Sender<bool>,
    stream: &str,
    step: &str,
) -> Result<String> {
    let joined = match tokio::time::timeout(READER_GRACE, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(step = %step, stream, "output still open after process exit; closing reader");
            let _ = stop.send(true);
            match tokio::time::timeout(READER_GRACE, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Ok(String::new());
                }
            }
        }
    };

    joined
        .with_context(|| format!("{stream} reader task panicked"))?
        .with_context(|| format!("reading {stream} of step '{step}'"))
}

#[cfg(unix)]
async fn kill_process_group(pgid: Option<u32>, step: &str) {
    let Some(pgid) = pgid else {
        return;
    };
    let result = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdin(Stdio::null())
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            debug!(step = %step, pgid, "killed step process group");
        }
        Ok(output) => warn!(
            step = %step,
            pgid,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "kill command failed for step process group"
        ),
        Err(e) => warn!(step = %step, error = %e, "failed to execute kill command"),
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pgid: Option<u32>, _step: &str) {}

/// Read `reader` until EOF or until `stop` flips, forwarding classified
/// records as they are produced and returning the captured text.
async fn drain_stream<R>(
    reader: R,
    mut classifier: LineClassifier,
    log: StepLog,
    mut stop: watch::Receiver<bool>,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => read?,
            _ = stop.wait_for(|stopped| *stopped) => break,
        };
        if read == 0 {
            break;
        }
        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim_end_matches(['\n', '\r']);

        if let Some(record) = classifier.feed(line) {
            log.log(record.level, &record.message);
        }
        captured.push_str(line);
        captured.push('\n');
    }

    if let Some(record) = classifier.finish() {
        log.log(record.level, &record.message);
    }

    Ok(captured)
}
