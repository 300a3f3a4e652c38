//! Run configuration
//!
//! Loaded from `colcrypt.toml` in the repository root (or an explicit
//! `--config` path). Everything has a default except the sensitive-column
//! list: a run with nothing configured analyzes nothing, and that is an
//! input error, not a silent no-op.
//!
//! ```toml
//! # colcrypt.toml
//! [[tables]]
//! table = "employee"
//! columns = ["ssn", "salary"]
//!
//! [batch]
//! max_files = 8
//! max_bytes = 262144
//!
//! [retry]
//! max_attempts = 3
//! base_backoff_ms = 500
//!
//! [generator]
//! backend = "anthropic"   # anthropic | openai | ollama
//! timeout_secs = 120
//!
//! [modify]
//! workers = 4
//! backup_dir = ".colcrypt/backups"
//! ```

use crate::batch::BatchLimits;
use crate::executor::RetryPolicy;
use crate::generator::LlmBackend;
use crate::models::TableColumn;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "colcrypt.toml";

/// One configured table and its sensitive columns.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub backend: LlmBackend,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            model: None,
            max_tokens: 8192,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModifyConfig {
    pub workers: usize,
    pub backup_dir: PathBuf,
}

impl Default for ModifyConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            backup_dir: PathBuf::from(".colcrypt/backups"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub batch: BatchLimits,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub modify: ModifyConfig,
}

impl Config {
    /// Load from an explicit path, or from `colcrypt.toml` under `root`.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => root.join(CONFIG_FILE),
        };
        if !path.exists() {
            bail!(
                "No configuration found at {}. Create a {} with at least one [[tables]] entry.",
                path.display(),
                CONFIG_FILE
            );
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        debug!(
            "loaded config from {} ({} table(s))",
            path.display(),
            config.tables.len()
        );
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            bail!("configuration has no [[tables]] entries; nothing to analyze");
        }
        for table in &self.tables {
            if table.columns.is_empty() {
                bail!("table '{}' lists no columns", table.table);
            }
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.batch.max_files == 0 {
            bail!("batch.max_files must be at least 1");
        }
        Ok(())
    }

    /// Flatten the table config into (table, column) pairs, in config order.
    pub fn sensitive_columns(&self) -> Vec<TableColumn> {
        self.tables
            .iter()
            .flat_map(|t| {
                t.columns
                    .iter()
                    .map(|c| TableColumn::new(t.table.clone(), c.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let raw = r#"
            [[tables]]
            table = "employee"
            columns = ["ssn", "salary"]

            [[tables]]
            table = "customer"
            columns = ["card_no"]

            [batch]
            max_files = 4
            max_bytes = 1024

            [retry]
            max_attempts = 5
            base_backoff_ms = 250

            [generator]
            backend = "ollama"
            timeout_secs = 60

            [modify]
            workers = 2
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();

        let pairs = config.sensitive_columns();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], TableColumn::new("employee", "ssn"));
        assert_eq!(config.batch.max_files, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.generator.backend, LlmBackend::Ollama);
        assert_eq!(config.modify.workers, 2);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let raw = r#"
            [[tables]]
            table = "employee"
            columns = ["ssn"]
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.modify.workers, 4);
        assert_eq!(config.generator.timeout_secs, 120);
    }

    #[test]
    fn test_empty_tables_rejected() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_without_columns_rejected() {
        let raw = r#"
            [[tables]]
            table = "employee"
            columns = []
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }
}
