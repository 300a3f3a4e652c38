//! CLI command definitions and handlers
//!
//! The commands are thin callers of the library: load config and facts,
//! run the engine, render reports. No analysis or modification logic
//! lives here.

mod analyze;
mod list;
mod modify;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// colcrypt - call-graph powered sensitive-column encryption refactoring
#[derive(Parser, Debug)]
#[command(name = "colcrypt")]
#[command(
    version,
    about = "Find every execution path into sensitive DB columns and rewrite the touched files to encrypt them",
    long_about = "colcrypt builds a call graph from front-end parser facts, walks it backward \
from every SQL access of a configured sensitive column up to the network-facing entry points, \
and then drives an LLM backend to patch each impacted file - with exact-match validation, \
structural verification, bounded retries, and byte-exact rollback.",
    after_help = "\
Examples:
  colcrypt analyze --facts facts.json              Impact analysis, text report
  colcrypt analyze --facts facts.json -f json      JSON report for diffing between runs
  colcrypt list --entry-points                     Entry points from the last analysis
  colcrypt modify --facts facts.json --dry-run     Full pipeline, nothing written
  colcrypt modify --facts facts.json               Apply generated patches"
)]
pub struct Cli {
    /// Path to repository root (default: current directory)
    #[arg(global = true, long, default_value = ".")]
    pub root: PathBuf,

    /// Path to colcrypt.toml (default: <root>/colcrypt.toml)
    #[arg(global = true, long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the call graph and report impact paths for configured columns
    Analyze {
        /// Fact file produced by the parsing front end
        #[arg(long)]
        facts: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List results from the last analysis
    List {
        /// List entry points instead of the summary
        #[arg(long)]
        entry_points: bool,

        /// List impacted files instead of the summary
        #[arg(long)]
        files: bool,
    },

    /// Generate and apply encryption patches for every impacted file
    Modify {
        /// Fact file produced by the parsing front end
        #[arg(long)]
        facts: PathBuf,

        /// Validate and verify everything but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Number of parallel batch workers (1-64); overrides config
        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

/// Where the last analysis report is cached for `list` and `modify`.
pub(crate) fn analysis_cache_path(root: &Path) -> PathBuf {
    root.join(".colcrypt").join("analysis.json")
}

pub(crate) fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Analyze {
            facts,
            format,
            output,
        } => analyze::run(&cli, facts, format, output.as_deref()),
        Commands::List {
            entry_points,
            files,
        } => list::run(&cli, *entry_points, *files),
        Commands::Modify {
            facts,
            dry_run,
            workers,
            format,
            output,
        } => modify::run(&cli, facts, *dry_run, *workers, format, output.as_deref()),
    }
}
