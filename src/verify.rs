//! Post-apply structural sanity check
//!
//! After a patch applies, the new content must still parse as a well-formed
//! instance of its file type before it is accepted. The real check belongs
//! to the parsing front end; the engine sees it through `StructuralCheck`
//! so any validator can be plugged in. `DelimiterCheck` is the built-in
//! fallback: per-language delimiter balance, enough to catch a generator
//! that truncated a block or dropped a closing brace.

use std::path::Path;

/// Verdict from a structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralVerdict {
    WellFormed,
    Malformed { detail: String },
}

/// The external front-end collaborator seam.
pub trait StructuralCheck: Send + Sync {
    fn check(&self, file: &Path, content: &str) -> StructuralVerdict;
}

/// Built-in balance check over braces, brackets, and parentheses, with
/// string and line-comment awareness for brace languages.
#[derive(Debug, Default)]
pub struct DelimiterCheck;

impl StructuralCheck for DelimiterCheck {
    fn check(&self, file: &Path, content: &str) -> StructuralVerdict {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "java" | "cs" | "js" | "ts" | "go" | "rs" | "cpp" | "c" | "h" => {
                balance_braces(content)
            }
            "xml" | "html" => balance_angle_tags(content),
            // Unknown file types pass; rejecting what we cannot judge would
            // turn every config file into a rollback.
            _ => StructuralVerdict::WellFormed,
        }
    }
}

fn balance_braces(content: &str) -> StructuralVerdict {
    let mut depth_brace: i64 = 0;
    let mut depth_paren: i64 = 0;
    let mut depth_bracket: i64 = 0;

    for (line_no, line) in content.lines().enumerate() {
        let mut in_string: Option<char> = None;
        let mut escaped = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if escaped {
                escaped = false;
                continue;
            }
            match in_string {
                Some(quote) => match c {
                    '\\' => escaped = true,
                    _ if c == quote => in_string = None,
                    _ => {}
                },
                None => match c {
                    '"' | '\'' => in_string = Some(c),
                    '/' if chars.peek() == Some(&'/') => break, // line comment
                    '{' => depth_brace += 1,
                    '}' => depth_brace -= 1,
                    '(' => depth_paren += 1,
                    ')' => depth_paren -= 1,
                    '[' => depth_bracket += 1,
                    ']' => depth_bracket -= 1,
                    _ => {}
                },
            }
            if depth_brace < 0 || depth_paren < 0 || depth_bracket < 0 {
                return StructuralVerdict::Malformed {
                    detail: format!("unmatched closing delimiter at line {}", line_no + 1),
                };
            }
        }
    }

    if depth_brace != 0 || depth_paren != 0 || depth_bracket != 0 {
        return StructuralVerdict::Malformed {
            detail: format!(
                "unbalanced delimiters at end of file (braces {depth_brace:+}, parens {depth_paren:+}, brackets {depth_bracket:+})"
            ),
        };
    }
    StructuralVerdict::WellFormed
}

fn balance_angle_tags(content: &str) -> StructuralVerdict {
    let open = content.matches('<').count();
    let close = content.matches('>').count();
    if open != close {
        return StructuralVerdict::Malformed {
            detail: format!("unbalanced angle brackets ({open} '<' vs {close} '>')"),
        };
    }
    StructuralVerdict::WellFormed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_java_passes() {
        let check = DelimiterCheck;
        let content = "class A {\n  void run() {\n    int[] xs = new int[3];\n  }\n}\n";
        assert_eq!(
            check.check(Path::new("A.java"), content),
            StructuralVerdict::WellFormed
        );
    }

    #[test]
    fn test_truncated_block_fails() {
        let check = DelimiterCheck;
        let content = "class A {\n  void run() {\n";
        assert!(matches!(
            check.check(Path::new("A.java"), content),
            StructuralVerdict::Malformed { .. }
        ));
    }

    #[test]
    fn test_extra_closer_fails_with_line() {
        let check = DelimiterCheck;
        let content = "class A {\n}\n}\n";
        match check.check(Path::new("A.java"), content) {
            StructuralVerdict::Malformed { detail } => assert!(detail.contains("line 3")),
            StructuralVerdict::WellFormed => panic!("expected malformed"),
        }
    }

    #[test]
    fn test_braces_in_strings_and_comments_ignored() {
        let check = DelimiterCheck;
        let content = "class A {\n  String s = \"}{\"; // } stray {\n}\n";
        assert_eq!(
            check.check(Path::new("A.java"), content),
            StructuralVerdict::WellFormed
        );
    }

    #[test]
    fn test_unknown_extension_passes() {
        let check = DelimiterCheck;
        assert_eq!(
            check.check(Path::new("notes.txt"), "((("),
            StructuralVerdict::WellFormed
        );
    }

    #[test]
    fn test_xml_balance() {
        let check = DelimiterCheck;
        assert_eq!(
            check.check(Path::new("Mapper.xml"), "<select id=\"a\"></select>"),
            StructuralVerdict::WellFormed
        );
        assert!(matches!(
            check.check(Path::new("Mapper.xml"), "<select id=\"a\"</select>"),
            StructuralVerdict::Malformed { .. }
        ));
    }
}
