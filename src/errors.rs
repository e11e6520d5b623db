// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagrunError {
    /// Malformed or inconsistent DAG specification.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Step not found in DAG: {0}")]
    UnknownStep(String),

    /// Failure in the orchestrator's own machinery rather than in a step.
    #[error("Execution infrastructure error: {0}")]
    Infrastructure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DagrunError {
    /// Whether this error belongs to the configuration-time family that
    /// aborts a run before any step starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DagrunError::Config(_) | DagrunError::DagCycle(_) | DagrunError::Toml(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;
