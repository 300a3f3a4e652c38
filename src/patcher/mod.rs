//! Parsing and atomic application of proposed edits
//!
//! The generator returns edit text in unified-diff form. It is parsed into
//! ordered hunks, each carrying the expected pre-image lines, the
//! replacement lines, and the 1-based line hint where the pre-image must
//! sit. Validation is exact-match-or-reject: the pre-image has to match the
//! current content at the hinted location byte for byte. No fuzzy matching;
//! silently mis-patching sensitive code is worse than a retry.
//!
//! Application is all-or-nothing across the whole proposal: if any hunk
//! fails validation, nothing is applied and the typed rejection names the
//! first failing hunk with expected vs. actual context. Overlapping hunks
//! are rejected before application.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// One localized edit within a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based line in the original content where `pre_image` must start.
    pub start_line: usize,
    /// Exact lines expected at `start_line` (context plus removed lines).
    pub pre_image: Vec<String>,
    /// Lines that replace the pre-image (context plus added lines).
    pub replacement: Vec<String>,
}

/// Why a proposal was rejected. All variants are retryable: the caller may
/// request a fresh proposal within its retry budget.
#[derive(Debug, Clone, Error)]
pub enum PatchError {
    #[error("edit text is not a recognizable patch: {0}")]
    Malformed(String),

    #[error("hunk #{hunk_index} overlaps hunk #{other}")]
    Overlap { hunk_index: usize, other: usize },

    #[error("hunk #{hunk_index} extends past end of file (line {line}, file has {file_lines} lines)")]
    OutOfBounds {
        hunk_index: usize,
        line: usize,
        file_lines: usize,
    },

    #[error("hunk #{hunk_index} context mismatch at line {line}: expected {expected:?}, found {actual:?}")]
    ContextMismatch {
        hunk_index: usize,
        line: usize,
        expected: String,
        actual: String,
    },
}

impl PatchError {
    /// Index of the hunk this rejection names, where applicable.
    pub fn hunk_index(&self) -> Option<usize> {
        match self {
            PatchError::Malformed(_) => None,
            PatchError::Overlap { hunk_index, .. }
            | PatchError::OutOfBounds { hunk_index, .. }
            | PatchError::ContextMismatch { hunk_index, .. } => Some(*hunk_index),
        }
    }
}

fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@\s*-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s*@@").expect("valid regex")
    })
}

/// Parse raw edit text into ordered hunks.
///
/// Accepts standard unified-diff output: `---`/`+++`/`diff`/`index` headers
/// are skipped, `@@` headers open hunks, and body lines are ` ` (context),
/// `-` (removed), `+` (added). Anything else inside a hunk is malformed.
pub fn parse_edit_text(text: &str) -> Result<Vec<Hunk>, PatchError> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in text.lines() {
        if let Some(caps) = hunk_header_re().captures(line) {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            let start_line: usize = caps[1]
                .parse()
                .map_err(|_| PatchError::Malformed(format!("bad hunk header: {line}")))?;
            current = Some(Hunk {
                start_line,
                pre_image: Vec::new(),
                replacement: Vec::new(),
            });
            continue;
        }

        // File headers close any open hunk and return to preamble state.
        if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("diff ") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // Preamble: file headers and generator chatter before the first
            // hunk are tolerated; hunk bodies are not open yet.
            continue;
        };

        if let Some(ctx) = line.strip_prefix(' ') {
            hunk.pre_image.push(ctx.to_string());
            hunk.replacement.push(ctx.to_string());
        } else if let Some(removed) = line.strip_prefix('-') {
            hunk.pre_image.push(removed.to_string());
        } else if let Some(added) = line.strip_prefix('+') {
            hunk.replacement.push(added.to_string());
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        } else if line.is_empty() {
            // Some generators emit bare empty lines for empty context.
            hunk.pre_image.push(String::new());
            hunk.replacement.push(String::new());
        } else {
            return Err(PatchError::Malformed(format!(
                "unexpected line inside hunk: {line:?}"
            )));
        }
    }
    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }

    if hunks.is_empty() {
        return Err(PatchError::Malformed("no hunks found".to_string()));
    }
    for (i, hunk) in hunks.iter().enumerate() {
        if hunk.pre_image.is_empty() && hunk.replacement.is_empty() {
            return Err(PatchError::Malformed(format!("hunk #{i} is empty")));
        }
    }
    Ok(hunks)
}

/// Validate and apply a parsed proposal against original content.
///
/// Hunks are validated in ascending location order against the *original*
/// content, then applied in one pass. Any failure rejects the whole
/// proposal and the original content is untouched (the function is pure;
/// callers only write the returned string on success).
pub fn apply_hunks(original: &str, hunks: &[Hunk]) -> Result<String, PatchError> {
    let lines: Vec<&str> = original.lines().collect();

    // Work over location-sorted hunk references, remembering the caller's
    // indices for diagnostics.
    let mut order: Vec<usize> = (0..hunks.len()).collect();
    order.sort_by_key(|&i| hunks[i].start_line);

    // Overlap check before any validation work.
    for pair in order.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let a_end = hunks[a].start_line + hunks[a].pre_image.len();
        if a_end > hunks[b].start_line {
            return Err(PatchError::Overlap {
                hunk_index: b,
                other: a,
            });
        }
    }

    // Exact pre-image validation at each hinted location.
    for &i in &order {
        let hunk = &hunks[i];
        if hunk.start_line == 0 {
            return Err(PatchError::Malformed(format!(
                "hunk #{i} uses line 0; hunk locations are 1-based"
            )));
        }
        let start = hunk.start_line - 1;
        if start + hunk.pre_image.len() > lines.len() {
            return Err(PatchError::OutOfBounds {
                hunk_index: i,
                line: hunk.start_line,
                file_lines: lines.len(),
            });
        }
        for (offset, expected) in hunk.pre_image.iter().enumerate() {
            let actual = lines[start + offset];
            if actual != expected {
                return Err(PatchError::ContextMismatch {
                    hunk_index: i,
                    line: hunk.start_line + offset,
                    expected: expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }
    }

    // All hunks validated: splice ascending.
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;
    for &i in &order {
        let hunk = &hunks[i];
        let start = hunk.start_line - 1;
        out.extend(lines[cursor..start].iter().map(|s| s.to_string()));
        out.extend(hunk.replacement.iter().cloned());
        cursor = start + hunk.pre_image.len();
    }
    out.extend(lines[cursor..].iter().map(|s| s.to_string()));

    let mut content = out.join("\n");
    if original.ends_with('\n') && !content.is_empty() {
        content.push('\n');
    }
    Ok(content)
}

/// Parse and apply in one step.
pub fn apply(original: &str, edit_text: &str) -> Result<String, PatchError> {
    let hunks = parse_edit_text(edit_text)?;
    apply_hunks(original, &hunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "line one\nline two\nline three\nline four\nline five\n";

    #[test]
    fn test_parse_single_hunk() {
        let text = "--- a/f.java\n+++ b/f.java\n@@ -2,2 +2,2 @@\n line two\n-line three\n+LINE THREE\n";
        let hunks = parse_edit_text(text).unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].start_line, 2);
        assert_eq!(hunks[0].pre_image, vec!["line two", "line three"]);
        assert_eq!(hunks[0].replacement, vec!["line two", "LINE THREE"]);
    }

    #[test]
    fn test_apply_single_hunk() {
        let text = "@@ -3,1 +3,1 @@\n-line three\n+LINE THREE\n";
        let patched = apply(ORIGINAL, text).unwrap();
        assert_eq!(
            patched,
            "line one\nline two\nLINE THREE\nline four\nline five\n"
        );
    }

    #[test]
    fn test_apply_multiple_hunks_ascending() {
        let text = "@@ -5,1 +5,1 @@\n-line five\n+FIVE\n@@ -1,1 +1,1 @@\n-line one\n+ONE\n";
        let patched = apply(ORIGINAL, text).unwrap();
        assert_eq!(patched, "ONE\nline two\nline three\nline four\nFIVE\n");
    }

    #[test]
    fn test_context_mismatch_names_first_failing_hunk() {
        let text = "@@ -2,1 +2,1 @@\n-not the real line\n+x\n";
        let err = apply(ORIGINAL, text).unwrap_err();
        match err {
            PatchError::ContextMismatch {
                hunk_index,
                line,
                expected,
                actual,
            } => {
                assert_eq!(hunk_index, 0);
                assert_eq!(line, 2);
                assert_eq!(expected, "not the real line");
                assert_eq!(actual, "line two");
            }
            other => panic!("expected ContextMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_rejection_is_all_or_nothing() {
        // First hunk valid, second mismatches; nothing may be applied.
        let text =
            "@@ -1,1 +1,1 @@\n-line one\n+ONE\n@@ -4,1 +4,1 @@\n-wrong context\n+x\n";
        let before = ORIGINAL.to_string();
        let err = apply(&before, text).unwrap_err();
        assert!(matches!(err, PatchError::ContextMismatch { hunk_index: 1, .. }));
        // Pure function: the original is untouched by construction.
        assert_eq!(before, ORIGINAL);
    }

    #[test]
    fn test_overlap_rejected_before_application() {
        let text = "@@ -1,3 +1,3 @@\n line one\n line two\n line three\n@@ -2,1 +2,1 @@\n-line two\n+X\n";
        let err = apply(ORIGINAL, text).unwrap_err();
        assert!(matches!(err, PatchError::Overlap { .. }));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let text = "@@ -99,1 +99,1 @@\n-nope\n+x\n";
        let err = apply(ORIGINAL, text).unwrap_err();
        assert!(matches!(err, PatchError::OutOfBounds { hunk_index: 0, .. }));
    }

    #[test]
    fn test_insertion_only_hunk() {
        let text = "@@ -2,1 +2,2 @@\n line two\n+inserted\n";
        let patched = apply(ORIGINAL, text).unwrap();
        assert_eq!(
            patched,
            "line one\nline two\ninserted\nline three\nline four\nline five\n"
        );
    }

    #[test]
    fn test_no_hunks_is_malformed() {
        let err = parse_edit_text("just some prose from the model\n").unwrap_err();
        assert!(matches!(err, PatchError::Malformed(_)));
    }

    #[test]
    fn test_trailing_newline_preserved() {
        let no_newline = "a\nb";
        let text = "@@ -1,1 +1,1 @@\n-a\n+A\n";
        let patched = apply(no_newline, text).unwrap();
        assert_eq!(patched, "A\nb");

        let with_newline = "a\nb\n";
        let patched = apply(with_newline, text).unwrap();
        assert_eq!(patched, "A\nb\n");
    }
}
