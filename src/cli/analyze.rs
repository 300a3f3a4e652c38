//! Analyze command implementation

use crate::analyzer::DbAccessAnalyzer;
use crate::cli::{analysis_cache_path, write_output, Cli};
use crate::config::Config;
use crate::facts::FactSet;
use crate::graph::CallGraphBuilder;
use crate::reporters::{self, AnalysisReport, OutputFormat};
use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub fn run(cli: &Cli, facts_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let config = Config::load(&cli.root, cli.config.as_deref())?;
    let facts = FactSet::from_json_file(facts_path)?;
    info!(
        "loaded {} method fact(s), {} access fact(s)",
        facts.methods.len(),
        facts.accesses.len()
    );

    let graph = CallGraphBuilder::build(&facts);
    info!(
        "call graph: {} node(s), {} edge(s), {} unresolved call site(s)",
        graph.node_count(),
        graph.edge_count(),
        graph.unresolved().len()
    );

    let analyzer = DbAccessAnalyzer::new(&graph);
    let analysis = analyzer.analyze(&facts.accesses, &config.sensitive_columns());
    let report = AnalysisReport::build(&graph, &analysis);

    // Cache for `list` and as a record of what `modify` will target.
    let cache = analysis_cache_path(&cli.root);
    if let Some(parent) = cache.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&cache, reporters::render_analysis_json(&report)?)
        .with_context(|| format!("Failed to write {}", cache.display()))?;

    let rendered = reporters::render_analysis(&report, OutputFormat::from_str(format)?)?;
    write_output(&rendered, output)
}
