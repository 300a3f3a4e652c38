//! Modify command implementation
//!
//! Full pipeline: facts → graph → impact → batches → generate/apply with
//! retry and rollback → modification report.

use crate::analyzer::DbAccessAnalyzer;
use crate::batch::BatchPlanner;
use crate::cli::{write_output, Cli};
use crate::config::Config;
use crate::executor::{BackupStore, ExecutorOptions, ModificationExecutor};
use crate::facts::FactSet;
use crate::generator::{LlmClient, LlmConfig, LlmGenerator};
use crate::graph::CallGraphBuilder;
use crate::reporters::{self, ModificationReport, OutputFormat};
use crate::tracker::ResultTracker;
use crate::verify::DelimiterCheck;
use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use std::str::FromStr;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn run(
    cli: &Cli,
    facts_path: &Path,
    dry_run: bool,
    workers: Option<usize>,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let config = Config::load(&cli.root, cli.config.as_deref())?;
    let facts = FactSet::from_json_file(facts_path)?;

    let graph = CallGraphBuilder::build(&facts);
    let analysis =
        DbAccessAnalyzer::new(&graph).analyze(&facts.accesses, &config.sensitive_columns());

    let impacted = analysis.impacted_files();
    if impacted.is_empty() {
        eprintln!("{}", style("No impacted files; nothing to modify.").yellow());
        return Ok(());
    }
    info!("{} impacted file(s)", impacted.len());

    let batches = BatchPlanner::new(config.batch).plan(&cli.root, &impacted);
    info!("{} batch(es) planned", batches.len());

    let llm_config = LlmConfig {
        backend: config.generator.backend,
        model: config.generator.model.clone(),
        max_tokens: config.generator.max_tokens,
        temperature: config.generator.temperature,
        timeout: Duration::from_secs(config.generator.timeout_secs),
    };
    let client = LlmClient::from_env(llm_config)
        .with_context(|| "Failed to initialize the generation backend")?;
    let generator = Arc::new(LlmGenerator::new(client));

    let backups = BackupStore::new(cli.root.join(&config.modify.backup_dir))?;
    let executor = ModificationExecutor::new(
        generator,
        Arc::new(DelimiterCheck),
        backups,
        ExecutorOptions {
            retry: config.retry,
            workers: workers.unwrap_or(config.modify.workers),
            dry_run,
        },
    );

    let progress = ProgressBar::new_spinner().with_message(format!(
        "processing {} batch(es){}",
        batches.len(),
        if dry_run { " (dry run)" } else { "" }
    ));
    progress.enable_steady_tick(Duration::from_millis(120));

    let tracker = ResultTracker::new();
    let cancel = AtomicBool::new(false);
    let stats = executor
        .run(&cli.root, &batches, &analysis, &tracker, &cancel)
        .map_err(|e| anyhow::anyhow!("run aborted: {e}"))?;
    progress.finish_and_clear();

    let report = ModificationReport::build(&tracker, stats, dry_run);
    let rendered = reporters::render_modification(&report, OutputFormat::from_str(format)?)?;
    write_output(&rendered, output)?;

    if report.summary.by_status.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
