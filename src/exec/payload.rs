// src/exec/payload.rs

//! Structured payload a step may print as its final stdout content.
//!
//! ```text
//! {"skipped": true}
//! {"success": false}
//! ```
//!
//! Field values are read by truthiness: `"true"`, `1` and `"yes"` count as
//! true; `"false"`, `0`, `""` and `null` count as false.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct StepPayload {
    #[serde(default, deserialize_with = "truthy")]
    pub skipped: bool,
    #[serde(default, deserialize_with = "truthy_opt")]
    pub success: Option<bool>,
}

impl StepPayload {
    pub fn reports_failure(&self) -> bool {
        self.success == Some(false)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "" | "false" | "0" | "no" | "off"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Value::deserialize(deserializer).map(|v| is_truthy(&v))
}

fn truthy_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok((!value.is_null()).then(|| is_truthy(&value)))
}

/// Parse the whole stdout as one JSON object, falling back to the last
/// non-empty line. Returns `None` when neither is a payload object.
pub fn parse_payload(stdout: &str) -> Option<StepPayload> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(payload) = parse_object(trimmed) {
        return Some(payload);
    }

    let last = trimmed.lines().rev().find(|l| !l.trim().is_empty())?;
    parse_object(last.trim())
}

fn parse_object(text: &str) -> Option<StepPayload> {
    if !text.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<StepPayload>(text) {
        Ok(payload) => Some(payload),
        Err(e) => {
            debug!(error = %e, "object-shaped stdout is not a step payload");
            None
        }
    }
}
