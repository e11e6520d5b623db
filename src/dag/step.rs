// src/dag/step.rs

//! Step descriptors: the immutable per-step data the scheduler and the
//! executor work from.

use std::fmt;
use std::time::Duration;

use crate::config::model::{ConfigFile, StepConfig};

/// Canonical step name type.
pub type StepName = String;

/// Command descriptor for one step: what to launch and with which extra
/// environment. The child also inherits the orchestrator's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// One step of the DAG.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub name: StepName,
    pub invocation: Invocation,
    pub dependencies: Vec<StepName>,
    /// Total attempt budget, always >= 1.
    pub retries: u32,
    pub force: bool,
    pub timeout: Option<Duration>,
}

impl StepSpec {
    pub fn new(name: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            name: name.into(),
            invocation,
            dependencies: Vec::new(),
            retries: 1,
            force: false,
            timeout: None,
        }
    }

    /// Build the spec for a configured step.
    ///
    /// The launch convention is
    /// `<interpreter> <script> --config_file <config> [--target_date <date>] [args...]`.
    pub fn from_config(
        name: &str,
        step: &StepConfig,
        cfg: &ConfigFile,
        target_date: Option<&str>,
    ) -> Self {
        let mut invocation = Invocation::new(step.effective_interpreter(&cfg.options))
            .arg(&step.script)
            .arg("--config_file")
            .arg(&step.config);

        if let Some(date) = target_date {
            invocation = invocation.arg("--target_date").arg(date);
        }
        for extra in &step.args {
            invocation = invocation.arg(extra);
        }
        if let Some(ref dir) = cfg.paths.project_dir {
            invocation = invocation.env("PROJECT_DIR", dir);
        }

        Self {
            name: name.to_string(),
            invocation,
            dependencies: step.depends_on.clone(),
            retries: step.retries.max(1),
            force: step.force,
            timeout: step.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl ConfigFile {
    /// All steps of the DAG, in declaration order.
    pub fn step_specs(&self, target_date: Option<&str>) -> Vec<StepSpec> {
        self.dag
            .iter()
            .map(|(name, step)| StepSpec::from_config(name, step, self, target_date))
            .collect()
    }
}
