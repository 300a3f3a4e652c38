//! Terminal text rendering for reports

use crate::models::ModificationStatus;
use crate::reporters::{AnalysisReport, ModificationReport};
use console::style;

pub fn render_analysis_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n  {} methods, {} call edges, {} entry points, {} unresolved call sites\n\n",
        style("Call graph").bold(),
        report.graph.methods,
        report.graph.call_edges,
        report.graph.entry_points,
        report.graph.unresolved_calls,
    ));

    for set in &report.impact {
        let reachable = set.paths.iter().filter(|p| p.externally_reachable).count();
        out.push_str(&format!(
            "{} {}\n",
            style(format!("{}.{}", set.table, set.column)).bold(),
            if set.paths.is_empty() {
                style("(no impact)").dim().to_string()
            } else {
                format!(
                    "{} path(s), {} externally reachable, {} file(s)",
                    set.paths.len(),
                    reachable,
                    set.files.len()
                )
            }
        ));
        for path in &set.paths {
            let flag = if path.externally_reachable {
                style("[external]").red().to_string()
            } else {
                style("[internal]").dim().to_string()
            };
            let chain: Vec<String> = path.chain.iter().map(|k| k.to_string()).collect();
            out.push_str(&format!("  {} {}\n", flag, chain.join(" -> ")));
        }
        for (layer, files) in &set.files_by_layer {
            out.push_str(&format!(
                "  {:<12} {}\n",
                format!("{layer}:"),
                files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        out.push('\n');
    }

    if !report.missing_columns.is_empty() {
        out.push_str(&format!(
            "{} {}\n",
            style("Configured but never accessed:").yellow(),
            report
                .missing_columns
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if !report.unresolved_calls.is_empty() {
        out.push_str(&format!(
            "{} {} call site(s) could not be resolved; see the JSON report for candidates\n",
            style("Note:").yellow(),
            report.unresolved_calls.len()
        ));
    }
    out
}

pub fn render_modification_text(report: &ModificationReport) -> String {
    let mut out = String::new();
    if report.dry_run {
        out.push_str(&format!(
            "{}\n",
            style("Dry run: no files were written").yellow().bold()
        ));
    }
    out.push_str(&format!(
        "{} {} applied, {} failed, {} rolled back ({} batch(es), {} file(s) processed",
        style("Result:").bold(),
        report.summary.by_status.applied,
        report.summary.by_status.failed,
        report.summary.by_status.rolled_back,
        report.stats.batches_dispatched,
        report.stats.files_processed,
    ));
    if report.stats.files_skipped > 0 {
        out.push_str(&format!(", {} skipped by cancellation", report.stats.files_skipped));
    }
    out.push_str(")\n\n");

    for record in &report.records {
        let status = match record.status {
            ModificationStatus::Applied => style("applied").green().to_string(),
            ModificationStatus::Failed => style("failed").red().to_string(),
            ModificationStatus::RolledBack => style("rolled_back").yellow().to_string(),
            ModificationStatus::Pending => style("pending").dim().to_string(),
        };
        out.push_str(&format!(
            "  {:<12} {} ({} attempt(s))",
            status,
            record.file.display(),
            record.retry_count
        ));
        if let Some(reason) = &record.failure_reason {
            out.push_str(&format!("\n               {}", style(reason).dim()));
        }
        out.push('\n');
    }

    if !report.summary.retry_distribution.is_empty() {
        out.push_str(&format!("\n{}\n", style("Retry distribution").bold()));
        for (retries, count) in &report.summary.retry_distribution {
            out.push_str(&format!("  {retries} attempt(s): {count} file(s)\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RunStats;
    use crate::models::{ModificationRecord, TableColumn};
    use crate::reporters::GraphStats;
    use crate::tracker::ResultTracker;

    #[test]
    fn test_modification_text_mentions_every_record() {
        let tracker = ResultTracker::new();
        let mut record = ModificationRecord::pending(
            "src/Dao.java".into(),
            vec![TableColumn::new("employee", "ssn")],
        );
        record.status = ModificationStatus::Applied;
        record.retry_count = 1;
        tracker.finalize(record);

        let report = ModificationReport::build(&tracker, RunStats::default(), false);
        let text = render_modification_text(&report);
        assert!(text.contains("src/Dao.java"));
        assert!(text.contains("applied"));
    }

    #[test]
    fn test_analysis_text_surfaces_missing_columns() {
        let report = AnalysisReport {
            duplicate_path_policy: "record-once".to_string(),
            graph: GraphStats {
                methods: 0,
                call_edges: 0,
                entry_points: 0,
                unresolved_calls: 0,
            },
            entry_points: vec![],
            impact: vec![],
            missing_columns: vec![TableColumn::new("customer", "card_no")],
            unresolved_calls: vec![],
        };
        let text = render_analysis_text(&report);
        assert!(text.contains("customer.card_no"));
    }
}
