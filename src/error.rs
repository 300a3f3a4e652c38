//! Engine error taxonomy
//!
//! Per-file failures stay localized to that file's ModificationRecord;
//! only `BackupRestoreFailed` escalates to a run-level abort, because a
//! backup that cannot be restored means the file's true state is unknown.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the modification engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Hunk context did not match the current file content. Retryable.
    #[error("patch rejected for {file}: hunk #{hunk_index} at line {line}: {detail}")]
    PatchRejected {
        file: PathBuf,
        hunk_index: usize,
        line: usize,
        detail: String,
    },

    /// The generator invocation failed (network, remote, timeout). Retryable
    /// with backoff; a timeout consumes one retry attempt.
    #[error("generator invocation failed: {0}")]
    GeneratorInvocationFailed(String),

    /// The applied content no longer parses as a well-formed instance of its
    /// file type. Triggers rollback; a fresh proposal may still be requested
    /// within the retry budget.
    #[error("structural validation failed for {file}: {detail}")]
    StructuralValidationFailed { file: PathBuf, detail: String },

    /// All attempts for this file are exhausted. Terminal per file.
    #[error("retry budget exhausted for {file} after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted {
        file: PathBuf,
        attempts: u32,
        last_error: String,
    },

    /// A backup could not be restored. Fatal to the run: the file's true
    /// state is unknown and it must be flagged for manual inspection.
    #[error("backup restore failed for {file} (snapshot {snapshot}): {detail}")]
    BackupRestoreFailed {
        file: PathBuf,
        snapshot: String,
        detail: String,
    },

    #[error("io error on {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Whether the retry controller may re-attempt after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::PatchRejected { .. } | EngineError::GeneratorInvocationFailed(_)
        )
    }

    /// Whether this error aborts the whole run rather than one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::BackupRestoreFailed { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rejected = EngineError::PatchRejected {
            file: "a.java".into(),
            hunk_index: 0,
            line: 1,
            detail: "mismatch".into(),
        };
        assert!(rejected.is_transient());
        assert!(!rejected.is_fatal());

        let invoke = EngineError::GeneratorInvocationFailed("timeout".into());
        assert!(invoke.is_transient());

        let structural = EngineError::StructuralValidationFailed {
            file: "a.java".into(),
            detail: "unbalanced braces".into(),
        };
        assert!(!structural.is_transient());

        let restore = EngineError::BackupRestoreFailed {
            file: "a.java".into(),
            snapshot: "abc".into(),
            detail: "gone".into(),
        };
        assert!(restore.is_fatal());
    }
}
