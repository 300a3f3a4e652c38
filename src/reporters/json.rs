//! Machine-readable JSON reports
//!
//! Field names come straight from the serde derives on the report structs
//! and stay stable across versions; consumers diff these between runs.

use crate::reporters::{AnalysisReport, ModificationReport};
use anyhow::{Context, Result};

pub fn render_analysis_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize analysis report")
}

pub fn render_modification_json(report: &ModificationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize modification report")
}
