//! LLM-backed patch generation
//!
//! Turns a batch context into one prompt, invokes the configured backend,
//! and splits the response back into per-file proposals. The response
//! contract is one `### FILE:` section per target, each holding a fenced
//! unified diff; anything that does not follow the contract is a
//! `BadResponse` and the retry controller takes it from there.

use crate::generator::{
    BatchContext, GeneratorError, GeneratorResult, LlmClient, Message, PatchGenerator,
};
use crate::models::PatchProposal;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a refactoring engine. You receive source files that read or \
write sensitive database columns, and you produce minimal unified-diff \
patches that route those values through the project's encryption helper at \
every read and write site. Respond with one section per file, in the form:\n\
### FILE: <path>\n\
```diff\n\
@@ -<line>,<count> +<line>,<count> @@\n\
...\n\
```\n\
Output nothing else. Do not rename files. Do not reformat untouched lines.";

fn file_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)### FILE:\s*(.+?)\s*\n```(?:diff)?\n(.*?)```").expect("valid regex")
    })
}

/// `PatchGenerator` over an LLM backend.
pub struct LlmGenerator {
    client: LlmClient,
}

impl LlmGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn build_prompt(ctx: &BatchContext) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!(
            "Rewrite the following {} file(s) so the listed sensitive columns \
             are encrypted before writes and decrypted after reads.\n\n",
            ctx.targets.len()
        ));
        for target in &ctx.targets {
            prompt.push_str(&format!("### FILE: {}\n", target.file.display()));
            prompt.push_str("Sensitive columns: ");
            let cols: Vec<String> = target
                .rationale
                .iter()
                .map(|r| match r.access_kind {
                    Some(kind) => format!("{} ({kind})", r.column),
                    None => r.column.to_string(),
                })
                .collect();
            prompt.push_str(&cols.join(", "));
            prompt.push_str("\n```\n");
            prompt.push_str(&target.content);
            if !target.content.ends_with('\n') {
                prompt.push('\n');
            }
            prompt.push_str("```\n\n");
        }
        prompt
    }

    fn parse_response(ctx: &BatchContext, response: &str) -> GeneratorResult<Vec<PatchProposal>> {
        let mut proposals = Vec::new();
        for caps in file_section_re().captures_iter(response) {
            let file = PathBuf::from(caps[1].trim());
            let edit_text = caps[2].to_string();
            if !ctx.targets.iter().any(|t| t.file == file) {
                debug!("generator proposed edit for unrequested file {}", file.display());
                continue;
            }
            proposals.push(PatchProposal {
                file,
                edit_text,
                batch_index: ctx.batch_index,
            });
        }
        if proposals.is_empty() {
            return Err(GeneratorError::BadResponse(
                "response contained no per-file patch sections".to_string(),
            ));
        }
        Ok(proposals)
    }
}

impl PatchGenerator for LlmGenerator {
    fn invoke(&self, ctx: &BatchContext) -> GeneratorResult<Vec<PatchProposal>> {
        let prompt = Self::build_prompt(ctx);
        debug!(
            "invoking {} ({}) for batch {} with {} target(s)",
            self.client.model(),
            match self.client.backend() {
                crate::generator::LlmBackend::Anthropic => "anthropic",
                crate::generator::LlmBackend::OpenAi => "openai",
                crate::generator::LlmBackend::Ollama => "ollama",
            },
            ctx.batch_index,
            ctx.targets.len()
        );
        let response = self
            .client
            .generate(vec![Message::user(prompt)], Some(SYSTEM_PROMPT))?;
        Self::parse_response(ctx, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{ColumnRationale, TargetFile};
    use crate::models::{AccessKind, TableColumn};

    fn ctx() -> BatchContext {
        BatchContext {
            batch_index: 2,
            targets: vec![TargetFile {
                file: "src/EmployeeDao.java".into(),
                content: "class EmployeeDao {}\n".to_string(),
                rationale: vec![ColumnRationale {
                    column: TableColumn::new("employee", "ssn"),
                    access_kind: Some(AccessKind::Read),
                }],
            }],
        }
    }

    #[test]
    fn test_parse_response_per_file() {
        let response = "### FILE: src/EmployeeDao.java\n```diff\n@@ -1,1 +1,1 @@\n-class EmployeeDao {}\n+class EmployeeDao { /* enc */ }\n```\n";
        let proposals = LlmGenerator::parse_response(&ctx(), response).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].file, PathBuf::from("src/EmployeeDao.java"));
        assert_eq!(proposals[0].batch_index, 2);
        assert!(proposals[0].edit_text.contains("@@ -1,1 +1,1 @@"));
    }

    #[test]
    fn test_parse_response_ignores_unrequested_files() {
        let response = "### FILE: src/Other.java\n```diff\n@@ -1,1 +1,1 @@\n-x\n+y\n```\n";
        let err = LlmGenerator::parse_response(&ctx(), response).unwrap_err();
        assert!(matches!(err, GeneratorError::BadResponse(_)));
    }

    #[test]
    fn test_prompt_lists_columns_and_content() {
        let prompt = LlmGenerator::build_prompt(&ctx());
        assert!(prompt.contains("employee.ssn (read)"));
        assert!(prompt.contains("class EmployeeDao {}"));
        assert!(prompt.contains("### FILE: src/EmployeeDao.java"));
    }
}
