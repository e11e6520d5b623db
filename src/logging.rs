// src/logging.rs

//! Logging setup for `dagrun` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `DAGRUN_LOG` environment variable (e.g. "info", "debug")
//! 3. `[logging].level` from the config file
//! 4. default to `info`
//!
//! Logs are sent to STDERR, and also appended to `[logging].log_file` when
//! one is configured. Steps listed under `[logging.steps]` additionally get
//! their classified output in their own file through [`FileSink`].
//!
//! The scheduler and executor never talk to the subscriber directly; they
//! receive a [`LogSink`] and forward classified step output through it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::cli::CliLogLevel;
use crate::config::model::LoggingSection;
use crate::types::LogLevel;

/// Logging capability injected into the executor.
///
/// One sink is shared by all steps; the step name is passed explicitly so
/// that per-step identity does not depend on any global logger registry.
pub trait LogSink: Send + Sync {
    fn log(&self, step: &str, level: LogLevel, message: &str);
}

/// Production sink: forwards records to `tracing` with a `step` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, step: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "dagrun::step", step = %step, "{}", message),
            LogLevel::Info => info!(target: "dagrun::step", step = %step, "{}", message),
            LogLevel::Warning => warn!(target: "dagrun::step", step = %step, "{}", message),
            LogLevel::Error => error!(target: "dagrun::step", step = %step, "{}", message),
        }
    }
}

/// A sink bound to one step name.
#[derive(Clone)]
pub struct StepLog {
    step: String,
    sink: Arc<dyn LogSink>,
}

impl StepLog {
    pub fn new(step: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            step: step.into(),
            sink,
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.sink.log(&self.step, level, message);
    }
}

impl std::fmt::Debug for StepLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepLog")
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

/// Appends records of selected steps to per-step files and forwards every
/// record to `inner`.
pub struct FileSink {
    inner: Arc<dyn LogSink>,
    files: HashMap<String, Mutex<File>>,
}

impl FileSink {
    /// Open (append, creating parent directories) one file per `step -> path`
    /// route.
    pub fn open(routes: &IndexMap<String, String>, inner: Arc<dyn LogSink>) -> Result<Self> {
        let mut files = HashMap::with_capacity(routes.len());
        for (step, path) in routes {
            let file = open_log_file(path)
                .with_context(|| format!("opening log file for step '{step}'"))?;
            files.insert(step.clone(), Mutex::new(file));
        }
        Ok(Self { inner, files })
    }
}

impl LogSink for FileSink {
    fn log(&self, step: &str, level: LogLevel, message: &str) {
        self.inner.log(step, level, message);

        let Some(file) = self.files.get(step) else {
            return;
        };
        let Ok(mut file) = file.lock() else {
            return;
        };
        let tag = level.to_string().to_uppercase();
        if let Err(e) = writeln!(file, "{tag} {step}: {message}") {
            debug!(step = %step, error = %e, "failed to write step log file");
        }
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("steps", &self.files.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Open `path` for appending, creating missing parent directories.
pub fn open_log_file(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<CliLogLevel>, logging: &LoggingSection) -> Result<()> {
    let level = resolve_level(
        cli_level,
        std::env::var("DAGRUN_LOG").ok().as_deref(),
        logging.level,
    );

    let file_layer = match logging.log_file {
        Some(ref path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Pick the effective subscriber level from the three possible sources.
pub fn resolve_level(
    cli_level: Option<CliLogLevel>,
    env_value: Option<&str>,
    config_level: Option<LogLevel>,
) -> tracing::Level {
    if let Some(lvl) = cli_level {
        return level_from_cli(lvl);
    }
    if let Some(lvl) = env_value.and_then(parse_level_str) {
        return lvl;
    }
    config_level
        .map(level_from_log_level)
        .unwrap_or(tracing::Level::INFO)
}

fn level_from_cli(lvl: CliLogLevel) -> tracing::Level {
    match lvl {
        CliLogLevel::Error => tracing::Level::ERROR,
        CliLogLevel::Warn => tracing::Level::WARN,
        CliLogLevel::Info => tracing::Level::INFO,
        CliLogLevel::Debug => tracing::Level::DEBUG,
        CliLogLevel::Trace => tracing::Level::TRACE,
    }
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warning => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
