//! List command implementation
//!
//! Reads the cached report from the last `analyze` run; never re-analyzes.

use crate::cli::{analysis_cache_path, Cli};
use crate::reporters::AnalysisReport;
use anyhow::{bail, Context, Result};
use console::style;
use rustc_hash::FxHashSet;

pub fn run(cli: &Cli, entry_points: bool, files: bool) -> Result<()> {
    let cache = analysis_cache_path(&cli.root);
    if !cache.exists() {
        bail!(
            "No analysis found. Run `colcrypt analyze` first.\nLooking for: {}",
            cache.display()
        );
    }
    let raw = std::fs::read_to_string(&cache)
        .with_context(|| format!("Failed to read {}", cache.display()))?;
    let report: AnalysisReport =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", cache.display()))?;

    if entry_points {
        for ep in &report.entry_points {
            let routes: Vec<String> = ep
                .routes
                .iter()
                .map(|r| format!("{} {}", r.verb, r.path))
                .collect();
            println!("{:<50} {}", ep.method, style(routes.join(", ")).dim());
        }
        return Ok(());
    }

    if files {
        let mut seen = FxHashSet::default();
        for set in &report.impact {
            for file in &set.files {
                if seen.insert(file.clone()) {
                    println!("{}", file.display());
                }
            }
        }
        return Ok(());
    }

    // Default: one summary line per configured column.
    for set in &report.impact {
        let reachable = set.paths.iter().filter(|p| p.externally_reachable).count();
        println!(
            "{:<30} {} path(s), {} externally reachable, {} file(s)",
            format!("{}.{}", set.table, set.column),
            set.paths.len(),
            reachable,
            set.files.len()
        );
    }
    if !report.missing_columns.is_empty() {
        println!(
            "{} {}",
            style("never accessed:").yellow(),
            report
                .missing_columns
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}
