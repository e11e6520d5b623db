// src/config/model.rs

use indexmap::IndexMap;
use serde::Deserialize;

use crate::types::{ExecutionMode, LogLevel};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// name = "ml-pipeline"
///
/// [options]
/// force = false
/// max_workers = 4
///
/// [dag.preprocess]
/// script = "steps/preprocess/preprocess.py"
/// config = "configs/preprocess.toml"
///
/// [dag.train]
/// script = "steps/train/train.py"
/// config = "configs/train.toml"
/// depends_on = ["preprocess"]
/// retries = 2
/// ```
///
/// All sections except `[dag.<name>]` entries are optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub options: OptionsSection,

    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub logging: LoggingSection,

    /// All steps from `[dag.<name>]`, in declaration order.
    #[serde(default)]
    pub dag: IndexMap<String, StepConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `config::validate`), so holding one means the DAG is well-formed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub name: String,
    pub options: OptionsSection,
    pub paths: PathsSection,
    pub logging: LoggingSection,
    pub dag: IndexMap<String, StepConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            name: raw.name,
            options: raw.options,
            paths: raw.paths,
            logging: raw.logging,
            dag: raw.dag,
        }
    }

    /// Look up a step's configuration in declaration order.
    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.dag.get(name)
    }
}

fn default_name() -> String {
    "pipeline".to_string()
}

/// `[options]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsSection {
    /// Global force flag: run every step even when its dependencies did not
    /// all succeed.
    #[serde(default)]
    pub force: bool,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default)]
    pub mode: ExecutionMode,

    /// Program used to launch step scripts.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Fixed pause between failed attempts of the same step.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_workers() -> usize {
    4
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for OptionsSection {
    fn default() -> Self {
        Self {
            force: false,
            max_workers: default_max_workers(),
            mode: ExecutionMode::default(),
            interpreter: default_interpreter(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    /// Exported to every step as `PROJECT_DIR`.
    #[serde(default)]
    pub project_dir: Option<String>,
}

/// `[logging]` section.
///
/// ```toml
/// [logging]
/// level = "INFO"
/// log_file = "logs/pipeline.log"
///
/// [logging.steps]
/// train = "logs/train.log"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<LogLevel>,

    /// Pipeline log: every orchestrator and step record is appended here
    /// in addition to stderr.
    #[serde(default)]
    pub log_file: Option<String>,

    /// Per-step log files. A listed step's classified output is also
    /// appended to its own file.
    #[serde(default)]
    pub steps: IndexMap<String, String>,
}

/// `[dag.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Script launched with the interpreter.
    pub script: String,

    /// Step-local configuration file, passed as `--config_file`.
    pub config: String,

    /// Steps that must reach a terminal status before this one is evaluated.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Total number of attempts (not additional retries).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Run this step even when a dependency did not succeed.
    #[serde(default)]
    pub force: bool,

    /// Per-step override of `[options].interpreter`.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Extra arguments appended after the standard ones.
    #[serde(default)]
    pub args: Vec<String>,

    /// Per-attempt timeout in seconds. No timeout when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_retries() -> u32 {
    1
}

impl StepConfig {
    pub fn effective_interpreter<'a>(&'a self, options: &'a OptionsSection) -> &'a str {
        self.interpreter.as_deref().unwrap_or(&options.interpreter)
    }
}
