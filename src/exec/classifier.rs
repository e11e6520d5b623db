// src/exec/classifier.rs

//! Line classification state machine for step output.
//!
//! One classifier is attached to each output stream. It turns raw lines into
//! log records:
//!
//! - `Normal`: a trace header (`Traceback (most recent call last):`) moves to
//!   `Collecting`. Otherwise a bracketed level tag (`[INFO]`, `[WARNING]`,
//!   ...) wins, then failure keywords (`traceback`, `error`, `exception`,
//!   `failed`, `fatal`, case-insensitive) force `Error`, and anything else is
//!   emitted at the stream's default level.
//! - `Collecting`: lines are buffered until a terminal exception line such as
//!   `ValueError: bad input`; the whole block is then emitted as one `Error`
//!   record and the state returns to `Normal`.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::LogLevel;

static TRACE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Traceback \(most recent call last\):").expect("trace header regex")
});

static TERMINAL_EXCEPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:[A-Za-z_][A-Za-z0-9_]*\.)*[A-Za-z0-9_]*(?:Error|Exception|Exit|Interrupt|Warning)(?::|\s*$)",
    )
    .expect("terminal exception regex")
});

static LEVEL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(trace|debug|info|warn|warning|error|critical|fatal)\]")
        .expect("level tag regex")
});

static FAILURE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)traceback|error|exception|failed|fatal").expect("failure keyword regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Normal,
    Collecting,
}

/// A log record produced from one or more output lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LineClassifier {
    default_level: LogLevel,
    state: ClassifierState,
    buffer: Vec<String>,
}

impl LineClassifier {
    pub fn new(default_level: LogLevel) -> Self {
        Self {
            default_level,
            state: ClassifierState::Normal,
            buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn default_level(&self) -> LogLevel {
        self.default_level
    }

    /// Feed one line (without trailing newline). Returns a record when one is
    /// complete; buffered trace lines return `None`.
    pub fn feed(&mut self, line: &str) -> Option<ClassifiedLine> {
        match self.state {
            ClassifierState::Normal => {
                if TRACE_HEADER.is_match(line) {
                    self.state = ClassifierState::Collecting;
                    self.buffer.push(line.to_string());
                    return None;
                }
                Some(ClassifiedLine {
                    level: self.level_for(line),
                    message: line.to_string(),
                })
            }
            ClassifierState::Collecting => {
                self.buffer.push(line.to_string());
                if TERMINAL_EXCEPTION.is_match(line) {
                    return self.flush();
                }
                None
            }
        }
    }

    /// End of stream: emit any partially collected trace.
    pub fn finish(&mut self) -> Option<ClassifiedLine> {
        self.flush()
    }

    fn flush(&mut self) -> Option<ClassifiedLine> {
        self.state = ClassifierState::Normal;
        if self.buffer.is_empty() {
            return None;
        }
        let message = self.buffer.join("\n");
        self.buffer.clear();
        Some(ClassifiedLine {
            level: LogLevel::Error,
            message,
        })
    }

    fn level_for(&self, line: &str) -> LogLevel {
        if let Some(level) = LEVEL_TAG
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| LogLevel::from_tag(m.as_str()))
        {
            return level;
        }
        if FAILURE_KEYWORD.is_match(line) {
            return LogLevel::Error;
        }
        self.default_level
    }
}
