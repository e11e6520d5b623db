// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;
use crate::types::ExecutionMode;

/// Command-line arguments for `dagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a DAG of pipeline steps with retries, skips and force overrides.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Run only this step, ignoring its dependencies.
    #[arg(long, value_name = "NAME")]
    pub step: Option<String>,

    /// Target date forwarded to every step as `--target_date`.
    #[arg(long, value_name = "DATE")]
    pub target_date: Option<String>,

    /// Run steps one at a time in declaration order.
    #[arg(long, conflicts_with = "parallel")]
    pub sequential: bool,

    /// Run steps concurrently, respecting dependencies.
    #[arg(long)]
    pub parallel: bool,

    /// Size of the worker pool in parallel mode.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_workers: Option<u32>,

    /// Run steps even when their dependencies did not all succeed.
    #[arg(long)]
    pub force: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG`, then `[logging].level`, then `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<CliLogLevel>,

    /// Parse + validate, print the DAG, but don't execute any step.
    #[arg(long)]
    pub dry_run: bool,

    /// Write a Graphviz DOT file coloured by final step status.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,
}

impl CliArgs {
    /// Mode requested on the command line, if any.
    pub fn mode_override(&self) -> Option<ExecutionMode> {
        if self.sequential {
            Some(ExecutionMode::Sequential)
        } else if self.parallel {
            Some(ExecutionMode::Parallel)
        } else {
            None
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
