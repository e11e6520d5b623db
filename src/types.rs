use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How a whole-DAG run is executed.
///
/// - `Parallel`: respect the graph; dispatch ready steps to a bounded worker
///   pool and apply the skip/force cascade (default).
/// - `Sequential`: run every step in declaration order, one at a time, and
///   only record each step's own reported status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(ExecutionMode::Parallel),
            "sequential" => Ok(ExecutionMode::Sequential),
            other => Err(format!(
                "invalid mode: {other} (expected \"parallel\" or \"sequential\")"
            )),
        }
    }
}

/// Severity of a log record emitted on behalf of a step, as passed to
/// [`crate::logging::LogSink`].
///
/// Deserializes case-insensitively through [`LogLevel::from_tag`], so
/// `"INFO"`, `"warn"` and `"CRITICAL"` are all accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        LogLevel::from_tag(&value).ok_or_else(|| {
            format!("invalid log level: {value} (expected debug, info, warning or error)")
        })
    }
}

impl LogLevel {
    /// Parse a bracketed tag body such as `INFO` or `warn`.
    ///
    /// `CRITICAL` and `FATAL` map to `Error`, `TRACE` maps to `Debug`.
    pub fn from_tag(tag: &str) -> Option<LogLevel> {
        match tag.trim().to_lowercase().as_str() {
            "trace" | "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" | "critical" | "fatal" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}
