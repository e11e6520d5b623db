// src/report.rs

//! Consumers of a finished run: summary logging, DAG structure printout and
//! Graphviz DOT export. None of this feeds back into scheduling.

use std::fmt::Write as _;

use tracing::{error, info, warn};

use crate::dag::{DependencyGraph, RunStatus, RunSummary};

/// Log the run summary the way operators read it at the end of a run.
pub fn log_summary(summary: &RunSummary) {
    info!("pipeline summary");
    if !summary.succeeded.is_empty() {
        info!("successful: {}", summary.succeeded.join(", "));
    }
    if !summary.skipped.is_empty() {
        warn!("skipped: {}", summary.skipped.join(", "));
    }
    if !summary.not_run.is_empty() {
        warn!("never run: {}", summary.not_run.join(", "));
    }
    if summary.failed.is_empty() {
        if summary.aborted {
            error!("run aborted");
        } else {
            info!("all steps completed without failure");
        }
    } else {
        error!("failed steps:");
        for (name, reason) in &summary.failed {
            error!(" - {name}: {reason}");
        }
    }
}

/// One line per level of each weakly connected component, indented by
/// level, e.g.
///
/// ```text
/// - ddl
///   - preprocess, train
///     - inference
/// ```
pub fn structure_lines(graph: &DependencyGraph) -> Vec<String> {
    let mut lines = Vec::new();
    for component in graph.components() {
        for (level, names) in graph.levels(&component).iter().enumerate() {
            lines.push(format!("{}- {}", "  ".repeat(level), names.join(", ")));
        }
    }
    lines
}

pub fn log_structure(graph: &DependencyGraph) {
    info!("DAG structure:");
    for line in structure_lines(graph) {
        info!("{line}");
    }
}

fn fill_colour(summary: &RunSummary, name: &str) -> &'static str {
    match summary.status_of(name) {
        Some(RunStatus::Success) => "green",
        Some(RunStatus::Skipped) => "orange",
        Some(RunStatus::Failed) => "red",
        None => "lightgray",
    }
}

/// Render the DAG as Graphviz DOT, left to right, with nodes coloured by
/// final status and nodes of the same level ranked together.
pub fn to_dot(graph: &DependencyGraph, summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph dagrun {{");
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  splines=ortho;");
    let _ = writeln!(out, "  node [style=filled];");

    for name in graph.steps() {
        let _ = writeln!(
            out,
            "  \"{}\" [fillcolor={}];",
            escape(name),
            fill_colour(summary, name)
        );
    }
    for parent in graph.steps() {
        for child in graph.children_of(parent) {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", escape(parent), escape(child));
        }
    }
    for names in graph.global_levels() {
        let members: Vec<String> = names.iter().map(|n| format!("\"{}\";", escape(n))).collect();
        let _ = writeln!(out, "  {{ rank=same; {} }}", members.join(" "));
    }

    out.push_str("}\n");
    out
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}
