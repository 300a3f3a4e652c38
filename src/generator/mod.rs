//! Patch generation capability
//!
//! The engine never talks to a specific AI provider directly. It depends on
//! the `PatchGenerator` trait: hand over a batch of target files with their
//! current content and the table/column rationale, get back one proposed
//! edit per file, or an error. One implementation per backend lives behind
//! the single trait; swapping providers never touches the engine.

mod client;
mod llm;

pub use client::{LlmBackend, LlmClient, LlmConfig, Message, Role};
pub use llm::LlmGenerator;

use crate::models::{AccessKind, PatchProposal, TableColumn};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors from invoking a generation backend. All of them are transient
/// from the engine's point of view: the retry controller re-attempts with
/// backoff until its budget runs out.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("missing API key: {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("generator returned an unusable response: {0}")]
    BadResponse(String),
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Why a column is sensitive, as passed to the generator.
#[derive(Debug, Clone)]
pub struct ColumnRationale {
    pub column: TableColumn,
    pub access_kind: Option<AccessKind>,
}

/// One file in a batch, with its current content and rationale.
#[derive(Debug, Clone)]
pub struct TargetFile {
    pub file: PathBuf,
    pub content: String,
    pub rationale: Vec<ColumnRationale>,
}

/// Everything a backend needs to propose edits for one batch.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_index: usize,
    pub targets: Vec<TargetFile>,
}

fn hunk_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^@@\s*-\d+").expect("valid regex"))
}

/// The capability the engine consumes.
pub trait PatchGenerator: Send + Sync {
    /// Produce one proposal per target file in the batch.
    fn invoke(&self, ctx: &BatchContext) -> GeneratorResult<Vec<PatchProposal>>;

    /// Cheap structural pre-check before full hunk parsing: does the edit
    /// text look like a patch at all?
    fn validate(&self, proposal: &PatchProposal) -> bool {
        hunk_marker_re().is_match(&proposal.edit_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullGenerator;
    impl PatchGenerator for NullGenerator {
        fn invoke(&self, _ctx: &BatchContext) -> GeneratorResult<Vec<PatchProposal>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_default_validate_requires_hunk_marker() {
        let generator = NullGenerator;
        let ok = PatchProposal {
            file: "a.java".into(),
            edit_text: "@@ -1,2 +1,2 @@\n context\n-x\n+y\n".to_string(),
            batch_index: 0,
        };
        let bad = PatchProposal {
            file: "a.java".into(),
            edit_text: "I think you should encrypt this column.".to_string(),
            batch_index: 0,
        };
        assert!(generator.validate(&ok));
        assert!(!generator.validate(&bad));
    }
}
