// src/config/validate.rs

use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::DependencyGraph;
use crate::errors::{DagrunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DagrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let cfg = ConfigFile::new_unchecked(raw);
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

/// Semantic validation of a deserialized config.
///
/// Filesystem checks live in [`ensure_step_configs_exist`] so that this
/// stays pure.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_options(cfg)?;
    validate_steps(cfg)?;
    validate_logging(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_steps(cfg: &ConfigFile) -> Result<()> {
    if cfg.dag.is_empty() {
        return Err(DagrunError::Config(
            "config must contain at least one [dag.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_options(cfg: &ConfigFile) -> Result<()> {
    if cfg.options.max_workers == 0 {
        return Err(DagrunError::Config(
            "[options].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.options.interpreter.trim().is_empty() {
        return Err(DagrunError::Config(
            "[options].interpreter must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_steps(cfg: &ConfigFile) -> Result<()> {
    for (name, step) in cfg.dag.iter() {
        if step.script.trim().is_empty() {
            return Err(DagrunError::Config(format!(
                "step '{name}' must have a non-empty `script`"
            )));
        }
        if step.config.trim().is_empty() {
            return Err(DagrunError::Config(format!(
                "step '{name}' must have a non-empty `config`"
            )));
        }
        if step.retries == 0 {
            return Err(DagrunError::Config(format!(
                "step '{name}': retries must be >= 1 (got 0)"
            )));
        }
        if let Some(ref interp) = step.interpreter {
            if interp.trim().is_empty() {
                return Err(DagrunError::Config(format!(
                    "step '{name}': interpreter must not be empty"
                )));
            }
        }
        if step.timeout_secs == Some(0) {
            return Err(DagrunError::Config(format!(
                "step '{name}': timeout_secs must be >= 1"
            )));
        }
    }
    Ok(())
}

fn validate_logging(cfg: &ConfigFile) -> Result<()> {
    if cfg
        .logging
        .log_file
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(DagrunError::Config(
            "[logging].log_file must not be empty".to_string(),
        ));
    }
    for (name, path) in cfg.logging.steps.iter() {
        if !cfg.dag.contains_key(name) {
            return Err(DagrunError::Config(format!(
                "[logging.steps] names unknown step '{name}'"
            )));
        }
        if path.trim().is_empty() {
            return Err(DagrunError::Config(format!(
                "[logging.steps].{name} must not be empty"
            )));
        }
    }
    Ok(())
}

/// Unknown references, self-dependencies and cycles are all detected by the
/// graph builder.
fn validate_dag(cfg: &ConfigFile) -> Result<()> {
    DependencyGraph::build(&cfg.step_specs(None))?;
    Ok(())
}

/// Every step's `config` file must exist before anything runs.
///
/// Relative paths are resolved against `base_dir`, which should be the
/// directory steps are launched from.
pub fn ensure_step_configs_exist(cfg: &ConfigFile, base_dir: &Path) -> Result<()> {
    for (name, step) in cfg.dag.iter() {
        let path = base_dir.join(&step.config);
        if !path.exists() {
            return Err(DagrunError::Config(format!(
                "config for step '{}' not found: {}",
                name,
                path.display()
            )));
        }
    }
    Ok(())
}
