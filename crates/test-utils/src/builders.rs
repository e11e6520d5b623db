#![allow(dead_code)]

use indexmap::IndexMap;
use dagrun::config::{
    ConfigFile, LoggingSection, OptionsSection, PathsSection, RawConfigFile, StepConfig,
};
use dagrun::dag::{Invocation, StepSpec};
use dagrun::types::ExecutionMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                name: "test-pipeline".to_string(),
                options: OptionsSection::default(),
                paths: PathsSection::default(),
                logging: LoggingSection::default(),
                dag: IndexMap::new(),
            },
        }
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.dag.insert(name.to_string(), step);
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.config.options.force = force;
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.config.options.max_workers = n;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.options.mode = mode;
        self
    }

    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.config.options.interpreter = interpreter.to_string();
        self
    }

    pub fn with_project_dir(mut self, dir: &str) -> Self {
        self.config.paths.project_dir = Some(dir.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(script: &str) -> Self {
        Self {
            step: StepConfig {
                script: script.to_string(),
                config: format!("{script}.toml"),
                depends_on: Vec::new(),
                retries: 1,
                force: false,
                interpreter: None,
                args: Vec::new(),
                timeout_secs: None,
            },
        }
    }

    pub fn config(mut self, path: &str) -> Self {
        self.step.config = path.to_string();
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.step.depends_on.push(dep.to_string());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.step.retries = n;
        self
    }

    pub fn force(mut self, val: bool) -> Self {
        self.step.force = val;
        self
    }

    pub fn interpreter(mut self, program: &str) -> Self {
        self.step.interpreter = Some(program.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.step.args.push(arg.to_string());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.step.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

/// Shorthand for a `StepSpec` without a real command behind it, for graph,
/// scheduler and fake-runner tests.
pub fn spec(name: &str, deps: &[&str]) -> StepSpec {
    let mut spec = StepSpec::new(name, Invocation::new("true"));
    spec.dependencies = deps.iter().map(|d| d.to_string()).collect();
    spec
}

/// Like [`spec`], with the step-level force flag set.
pub fn forced_spec(name: &str, deps: &[&str]) -> StepSpec {
    let mut spec = spec(name, deps);
    spec.force = true;
    spec
}
