//! Output reporters for analysis and modification results
//!
//! Two report shapes go outward: the impact report (per configured column,
//! every call chain and the files it spans) and the modification report
//! (per-file outcome records plus aggregates). Both serialize with stable
//! field names so reports from consecutive runs can be diffed.

mod json;
mod text;

pub use json::{render_analysis_json, render_modification_json};
pub use text::{render_analysis_text, render_modification_text};

use crate::analyzer::{ImpactAnalysis, ImpactSet};
use crate::executor::RunStats;
use crate::graph::{CallGraph, UnresolvedCall};
use crate::models::{ModificationRecord, RouteMarker, TableColumn};
use crate::tracker::{ResultTracker, TrackerSummary};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Graph-level counters included in the analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub methods: usize,
    pub call_edges: usize,
    pub entry_points: usize,
    pub unresolved_calls: usize,
}

/// One externally reachable method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPointReport {
    pub method: String,
    pub routes: Vec<RouteMarker>,
}

/// The full impact report for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Cycle policy in force, kept as a stable field so a future policy
    /// change shows up in report diffs.
    pub duplicate_path_policy: String,
    pub graph: GraphStats,
    pub entry_points: Vec<EntryPointReport>,
    pub impact: Vec<ImpactSet>,
    /// Configured pairs with no access facts; surfaced, never just logged.
    pub missing_columns: Vec<TableColumn>,
    pub unresolved_calls: Vec<UnresolvedCall>,
}

impl AnalysisReport {
    pub fn build(graph: &CallGraph, analysis: &ImpactAnalysis) -> Self {
        let entry_points: Vec<EntryPointReport> = graph
            .entry_points()
            .into_iter()
            .filter_map(|key| {
                graph.node(&key).map(|node| EntryPointReport {
                    method: key.to_string(),
                    routes: node.route_markers.clone(),
                })
            })
            .collect();

        Self {
            duplicate_path_policy: "record-once".to_string(),
            graph: GraphStats {
                methods: graph.node_count(),
                call_edges: graph.edge_count(),
                entry_points: entry_points.len(),
                unresolved_calls: graph.unresolved().len(),
            },
            entry_points,
            impact: analysis.sets.clone(),
            missing_columns: analysis.missing.clone(),
            unresolved_calls: graph.unresolved().to_vec(),
        }
    }
}

/// The per-file outcome report for one modification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationReport {
    pub dry_run: bool,
    pub stats: RunStats,
    pub summary: TrackerSummary,
    pub records: Vec<ModificationRecord>,
}

impl ModificationReport {
    pub fn build(tracker: &ResultTracker, stats: RunStats, dry_run: bool) -> Self {
        Self {
            dry_run,
            stats,
            summary: tracker.summary(),
            records: tracker.records(),
        }
    }
}

/// Render an analysis report in the requested format.
pub fn render_analysis(report: &AnalysisReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_analysis_json(report),
        OutputFormat::Text => Ok(render_analysis_text(report)),
    }
}

/// Render a modification report in the requested format.
pub fn render_modification(report: &ModificationReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_modification_json(report),
        OutputFormat::Text => Ok(render_modification_text(report)),
    }
}
