//! Modification execution: generate → apply → verify, with retry and
//! rollback
//!
//! Wraps the per-batch sequence {invoke generator → receive proposal per
//! file → patch apply → structural check} in a bounded retry policy.
//! Before any apply the file's content is snapshotted; an applied file
//! whose new content fails the structural check is restored from that
//! snapshot and finalized `rolled_back`. Transient failures (generator
//! errors, timeouts, patch rejections) consume attempts with backoff until
//! the budget runs out, which finalizes `failed` with the last diagnostic
//! and the file at its backed-up state.
//!
//! Batches run on a fixed-size worker pool. Files are guarded by per-file
//! exclusivity tokens, so a file that appears in two batches is still
//! applied serially. Cancellation stops dispatch of new batches
//! immediately; an in-flight worker finishes its current file's
//! backup/apply/verify cycle, then exits.

mod backup;

pub use backup::{BackupRef, BackupStore};

use crate::analyzer::ImpactAnalysis;
use crate::error::{EngineError, EngineResult};
use crate::generator::{BatchContext, ColumnRationale, PatchGenerator, TargetFile};
use crate::models::{Batch, ModificationRecord, ModificationStatus, PatchProposal};
use crate::patcher;
use crate::tracker::ResultTracker;
use crate::verify::{StructuralCheck, StructuralVerdict};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry policy for one file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum generation attempts per file (first try included).
    pub max_attempts: u32,
    /// Delay before the first re-attempt; doubles each retry.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(6);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    pub retry: RetryPolicy,
    pub workers: usize,
    /// Validate and verify but never write; captures the would-be diff.
    pub dry_run: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            workers: 4,
            dry_run: false,
        }
    }
}

/// Outcome counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub batches_dispatched: usize,
    pub files_processed: usize,
    /// Files left unprocessed because the run was cancelled.
    pub files_skipped: usize,
}

/// The Error/Retry Controller.
pub struct ModificationExecutor {
    generator: Arc<dyn PatchGenerator>,
    checker: Arc<dyn StructuralCheck>,
    backups: BackupStore,
    options: ExecutorOptions,
    file_tokens: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl ModificationExecutor {
    pub fn new(
        generator: Arc<dyn PatchGenerator>,
        checker: Arc<dyn StructuralCheck>,
        backups: BackupStore,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            generator,
            checker,
            backups,
            options,
            file_tokens: DashMap::new(),
        }
    }

    /// Process all batches. Returns run stats, or the fatal error that
    /// aborted the run (`BackupRestoreFailed` is the only one).
    pub fn run(
        &self,
        root: &Path,
        batches: &[Batch],
        analysis: &ImpactAnalysis,
        tracker: &ResultTracker,
        cancel: &AtomicBool,
    ) -> EngineResult<RunStats> {
        let workers = self.options.workers.max(1);
        let stats = Mutex::new(RunStats::default());
        let fatal: Mutex<Option<EngineError>> = Mutex::new(None);

        let (tx, rx) = crossbeam_channel::bounded::<&Batch>(workers);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let stats = &stats;
                let fatal = &fatal;
                scope.spawn(move || {
                    while let Ok(batch) = rx.recv() {
                        match self.process_batch(root, batch, analysis, tracker, cancel) {
                            Ok(batch_stats) => {
                                let mut s = stats.lock().expect("stats lock poisoned");
                                s.files_processed += batch_stats.0;
                                s.files_skipped += batch_stats.1;
                            }
                            Err(err) => {
                                warn!("run aborting: {err}");
                                cancel.store(true, Ordering::SeqCst);
                                let mut slot = fatal.lock().expect("fatal lock poisoned");
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                            }
                        }
                    }
                });
            }

            // Dispatch stops the moment cancellation is observed.
            for batch in batches {
                if cancel.load(Ordering::SeqCst) {
                    info!("cancellation observed; no further batches dispatched");
                    break;
                }
                stats.lock().expect("stats lock poisoned").batches_dispatched += 1;
                if tx.send(batch).is_err() {
                    break;
                }
            }
            drop(tx);
        });

        if let Some(err) = fatal.into_inner().expect("fatal lock poisoned") {
            return Err(err);
        }
        Ok(stats.into_inner().expect("stats lock poisoned"))
    }

    /// Returns (files processed, files skipped). Err only on fatal errors.
    fn process_batch(
        &self,
        root: &Path,
        batch: &Batch,
        analysis: &ImpactAnalysis,
        tracker: &ResultTracker,
        cancel: &AtomicBool,
    ) -> EngineResult<(usize, usize)> {
        debug!("batch {} with {} file(s)", batch.index, batch.files.len());

        // Records exist from dispatch time.
        let mut records: FxHashMap<PathBuf, ModificationRecord> = batch
            .files
            .iter()
            .map(|f| {
                (
                    f.clone(),
                    ModificationRecord::pending(f.clone(), analysis.contexts_for(f)),
                )
            })
            .collect();

        // One batch-level invocation up front; failures here count as the
        // first consumed attempt for every file in the batch.
        let (mut proposals, batch_error) = match self.invoke_batch(root, batch, analysis) {
            Ok(map) => (map, None),
            Err(e) => (FxHashMap::default(), Some(e.to_string())),
        };

        let mut processed = 0;
        let mut skipped = 0;
        let mut cancelled = false;
        for file in &batch.files {
            if cancelled {
                skipped += 1;
                continue;
            }
            let Some(record) = records.remove(file) else {
                continue;
            };
            let initial = proposals.remove(file);
            let outcome = self.process_file(
                root,
                batch.index,
                file,
                record,
                initial,
                batch_error.clone(),
                analysis,
            );
            match outcome {
                Ok(record) => {
                    tracker.finalize(record);
                    processed += 1;
                }
                Err((record, fatal)) => {
                    tracker.finalize(record);
                    return Err(fatal);
                }
            }
            // Cancellation lets the current file complete its cycle, then
            // stops the worker from taking up the rest of the batch.
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
            }
        }
        Ok((processed, skipped))
    }

    fn invoke_batch(
        &self,
        root: &Path,
        batch: &Batch,
        analysis: &ImpactAnalysis,
    ) -> EngineResult<FxHashMap<PathBuf, PatchProposal>> {
        let mut targets = Vec::new();
        for file in &batch.files {
            let content = std::fs::read_to_string(root.join(file)).map_err(|source| {
                EngineError::GeneratorInvocationFailed(format!(
                    "cannot read {}: {source}",
                    file.display()
                ))
            })?;
            targets.push(TargetFile {
                file: file.clone(),
                content,
                rationale: rationale_for(analysis, file),
            });
        }
        let ctx = BatchContext {
            batch_index: batch.index,
            targets,
        };
        let proposals = self
            .generator
            .invoke(&ctx)
            .map_err(|e| EngineError::GeneratorInvocationFailed(e.to_string()))?;
        Ok(proposals.into_iter().map(|p| (p.file.clone(), p)).collect())
    }

    /// Run the retry loop for one file. On success or per-file exhaustion
    /// the finalized record is returned; fatal errors return the record
    /// (flagged for manual inspection) alongside the error that aborts the
    /// run.
    #[allow(clippy::too_many_arguments)]
    fn process_file(
        &self,
        root: &Path,
        batch_index: usize,
        file: &PathBuf,
        mut record: ModificationRecord,
        initial_proposal: Option<PatchProposal>,
        batch_error: Option<String>,
        analysis: &ImpactAnalysis,
    ) -> Result<ModificationRecord, (ModificationRecord, EngineError)> {
        let token = self
            .file_tokens
            .entry(file.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = token.lock().expect("file token poisoned");

        let full_path = root.join(file);
        let content = match std::fs::read_to_string(&full_path) {
            Ok(c) => c,
            Err(e) => {
                record.status = ModificationStatus::Failed;
                record.failure_reason = Some(format!("cannot read file: {e}"));
                return Ok(record);
            }
        };

        // Immutable pre-apply snapshot; from here on the file is always
        // recoverable to this exact content.
        let backup = match self.backups.snapshot(file, &content) {
            Ok(b) => b,
            Err(e) => {
                record.status = ModificationStatus::Failed;
                record.failure_reason = Some(format!("cannot take backup: {e}"));
                return Ok(record);
            }
        };
        record.backup = Some(backup.id.clone());

        let max = self.options.retry.max_attempts;
        let mut attempts: u32 = 0;
        let mut last_error: Option<EngineError> = None;
        let mut proposal = initial_proposal;

        // A batch-level invocation failure has already consumed one
        // attempt for this file.
        if let Some(reason) = batch_error {
            attempts += 1;
            last_error = Some(EngineError::GeneratorInvocationFailed(reason));
        } else if proposal.is_none() {
            attempts += 1;
            last_error = Some(EngineError::GeneratorInvocationFailed(format!(
                "generator returned no proposal for {}",
                file.display()
            )));
        }

        while attempts < max {
            if attempts > 0 {
                std::thread::sleep(self.options.retry.backoff(attempts - 1));
            }
            attempts += 1;

            let current = match proposal.take() {
                Some(p) => p,
                None => match self.invoke_single(root, batch_index, file, analysis) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!("attempt {attempts}/{max} for {}: {e}", file.display());
                        last_error = Some(e);
                        continue;
                    }
                },
            };

            // Cheap pre-check before full hunk parsing.
            if !self.generator.validate(&current) {
                last_error = Some(EngineError::PatchRejected {
                    file: file.clone(),
                    hunk_index: 0,
                    line: 0,
                    detail: "edit text failed the pre-parse check".to_string(),
                });
                continue;
            }

            let new_content = match patcher::apply(&content, &current.edit_text) {
                Ok(c) => c,
                Err(e) => {
                    debug!("attempt {attempts}/{max} for {}: {e}", file.display());
                    last_error = Some(EngineError::PatchRejected {
                        file: file.clone(),
                        hunk_index: e.hunk_index().unwrap_or(0),
                        line: 0,
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            if self.options.dry_run {
                // Identical path through validation and sanity check, but
                // nothing is written; the would-be diff goes on the record.
                match self.checker.check(file, &new_content) {
                    StructuralVerdict::WellFormed => {
                        record.dry_run_diff = Some(unified_diff(file, &content, &new_content));
                        record.status = ModificationStatus::Applied;
                        record.retry_count = attempts;
                        return Ok(record);
                    }
                    StructuralVerdict::Malformed { detail } => {
                        last_error = Some(EngineError::StructuralValidationFailed {
                            file: file.clone(),
                            detail,
                        });
                        continue;
                    }
                }
            }

            if let Err(e) = std::fs::write(&full_path, &new_content) {
                record.status = ModificationStatus::Failed;
                record.retry_count = attempts;
                record.failure_reason = Some(format!("cannot write patched content: {e}"));
                // Best effort: the file may be partially written.
                if let Err(restore_err) = self.backups.restore(&full_path, &backup) {
                    return Err((record, restore_err));
                }
                return Ok(record);
            }

            // Post-apply structural gate, on what is actually on disk.
            let on_disk = std::fs::read_to_string(&full_path).unwrap_or_else(|_| new_content.clone());
            match self.checker.check(file, &on_disk) {
                StructuralVerdict::WellFormed => {
                    record.status = ModificationStatus::Applied;
                    record.retry_count = attempts;
                    return Ok(record);
                }
                StructuralVerdict::Malformed { detail } => {
                    // Rollback, never retry the same proposal; the budget
                    // still allows a fresh one.
                    info!(
                        "structural check failed for {} (attempt {attempts}/{max}): {detail}",
                        file.display()
                    );
                    if let Err(restore_err) = self.backups.restore(&full_path, &backup) {
                        record.status = ModificationStatus::Failed;
                        record.retry_count = attempts;
                        record.failure_reason =
                            Some("backup restore failed; file state unknown".to_string());
                        return Err((record, restore_err));
                    }
                    last_error = Some(EngineError::StructuralValidationFailed {
                        file: file.clone(),
                        detail,
                    });
                    continue;
                }
            }
        }

        // Budget exhausted. A final structural failure means the file was
        // applied and restored, which is a distinct outcome from never
        // having applied at all.
        let last = last_error.expect("exhausted budget implies at least one error");
        record.retry_count = attempts;
        record.status = match &last {
            EngineError::StructuralValidationFailed { .. } => ModificationStatus::RolledBack,
            _ => ModificationStatus::Failed,
        };
        record.failure_reason = Some(
            EngineError::RetryBudgetExhausted {
                file: file.clone(),
                attempts,
                last_error: last.to_string(),
            }
            .to_string(),
        );
        Ok(record)
    }

    fn invoke_single(
        &self,
        root: &Path,
        batch_index: usize,
        file: &PathBuf,
        analysis: &ImpactAnalysis,
    ) -> EngineResult<PatchProposal> {
        let content = std::fs::read_to_string(root.join(file)).map_err(|e| {
            EngineError::GeneratorInvocationFailed(format!("cannot read {}: {e}", file.display()))
        })?;
        let ctx = BatchContext {
            batch_index,
            targets: vec![TargetFile {
                file: file.clone(),
                content,
                rationale: rationale_for(analysis, file),
            }],
        };
        let mut proposals = self
            .generator
            .invoke(&ctx)
            .map_err(|e| EngineError::GeneratorInvocationFailed(e.to_string()))?;
        let found = proposals
            .drain(..)
            .find(|p| &p.file == file)
            .ok_or_else(|| {
                EngineError::GeneratorInvocationFailed(format!(
                    "generator returned no proposal for {}",
                    file.display()
                ))
            });
        found
    }
}

fn rationale_for(analysis: &ImpactAnalysis, file: &PathBuf) -> Vec<ColumnRationale> {
    analysis
        .contexts_for(file)
        .into_iter()
        .map(|column| ColumnRationale {
            column,
            access_kind: None,
        })
        .collect()
}

fn unified_diff(file: &Path, before: &str, after: &str) -> String {
    similar::TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(
            &format!("a/{}", file.display()),
            &format!("b/{}", file.display()),
        )
        .to_string()
}
