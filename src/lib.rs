// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::model::ConfigFile;
use crate::dag::{DependencyGraph, RunSummary};
use crate::engine::{PipelineRuntime, RunOptions};
use crate::exec::{ProcessOptions, ProcessRunner};
use crate::logging::{FileSink, LogSink, TracingSink};

/// High-level entry point used by `main.rs`.
///
/// Expects an already validated config. This wires together:
/// - CLI overrides of the `[options]` section
/// - the subprocess step runner with the tracing and per-step file sinks
/// - the pipeline runtime (parallel, sequential, or single step)
/// - summary logging and optional DOT export
pub async fn run(args: &CliArgs, cfg: &ConfigFile) -> Result<RunSummary> {
    let graph = DependencyGraph::build(&cfg.step_specs(None))?;

    if args.dry_run {
        print_dry_run(cfg, &graph);
        return Ok(RunSummary::default());
    }

    info!(pipeline = %cfg.name, "registering {} step(s)", graph.len());
    report::log_structure(&graph);

    let options = run_options(args, cfg);
    let runner = ProcessRunner::new(
        ProcessOptions {
            retry_delay: Duration::from_millis(cfg.options.retry_delay_ms),
            ..ProcessOptions::default()
        },
        step_sink(cfg)?,
    );
    let runtime = PipelineRuntime::new(runner, options);

    let specs = cfg.step_specs(args.target_date.as_deref());
    let summary = match args.step {
        Some(ref step) => runtime.run_single(specs, step).await?,
        None => runtime.run(specs).await?,
    };

    report::log_summary(&summary);

    if let Some(ref path) = args.dot {
        std::fs::write(path, report::to_dot(&graph, &summary))
            .with_context(|| format!("writing DOT file {}", path.display()))?;
        info!(path = %path.display(), "DAG visualization saved");
    }

    Ok(summary)
}

/// Step output goes to `tracing`, plus per-step files from `[logging.steps]`.
pub fn step_sink(cfg: &ConfigFile) -> Result<Arc<dyn LogSink>> {
    if cfg.logging.steps.is_empty() {
        return Ok(Arc::new(TracingSink));
    }
    let sink = FileSink::open(&cfg.logging.steps, Arc::new(TracingSink))?;
    Ok(Arc::new(sink))
}

/// Merge CLI overrides on top of `[options]`.
pub fn run_options(args: &CliArgs, cfg: &ConfigFile) -> RunOptions {
    RunOptions {
        mode: args.mode_override().unwrap_or(cfg.options.mode),
        max_workers: args
            .max_workers
            .map(|n| n as usize)
            .unwrap_or(cfg.options.max_workers),
        global_force: cfg.options.force || args.force,
    }
}

/// Simple dry-run output: print options, steps and the DAG structure.
fn print_dry_run(cfg: &ConfigFile, graph: &DependencyGraph) {
    println!("dagrun dry-run: {}", cfg.name);
    println!("  options.mode = {:?}", cfg.options.mode);
    println!("  options.max_workers = {}", cfg.options.max_workers);
    println!("  options.force = {}", cfg.options.force);
    if let Some(ref path) = cfg.logging.log_file {
        println!("  logging.log_file = {path}");
    }
    println!();

    println!("steps ({}):", cfg.dag.len());
    for (name, step) in cfg.dag.iter() {
        println!("  - {name}");
        println!(
            "      run: {} {} --config_file {}",
            step.effective_interpreter(&cfg.options),
            step.script,
            step.config
        );
        if !step.depends_on.is_empty() {
            println!("      depends_on: {:?}", step.depends_on);
        }
        if step.retries > 1 {
            println!("      retries: {}", step.retries);
        }
        if step.force {
            println!("      force: true");
        }
        if let Some(secs) = step.timeout_secs {
            println!("      timeout_secs: {secs}");
        }
        if let Some(path) = cfg.logging.steps.get(name) {
            println!("      log_file: {path}");
        }
    }
    println!();

    println!("structure:");
    for line in report::structure_lines(graph) {
        println!("  {line}");
    }

    debug!("dry-run complete (no execution)");
}
