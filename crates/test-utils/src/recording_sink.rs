use std::sync::Mutex;

use dagrun::logging::LogSink;
use dagrun::types::LogLevel;

/// A `LogSink` that keeps every record for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(String, LogLevel, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, LogLevel, String)> {
        self.records.lock().unwrap().clone()
    }

    /// Messages logged for `step` at `level`.
    pub fn messages_at(&self, step: &str, level: LogLevel) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, l, _)| s == step && *l == level)
            .map(|(_, _, m)| m.clone())
            .collect()
    }

    pub fn contains(&self, step: &str, needle: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|(s, _, m)| s == step && m.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, step: &str, level: LogLevel, message: &str) {
        self.records
            .lock()
            .unwrap()
            .push((step.to_string(), level, message.to_string()));
    }
}
