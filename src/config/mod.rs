// src/config/mod.rs

//! Configuration loading and validation for dagrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it once, up front, so that every configuration error surfaces
//!   before any step runs (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_and_validate};
pub use model::{
    ConfigFile, LoggingSection, OptionsSection, PathsSection, RawConfigFile, StepConfig,
};
pub use validate::{ensure_step_configs_exist, validate_config};
