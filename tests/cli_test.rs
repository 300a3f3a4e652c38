//! CLI flag parsing and config loading smoke tests.

use clap::Parser;
use colcrypt::cli::{Cli, Commands};
use colcrypt::config::Config;
use tempfile::TempDir;

#[test]
fn analyze_flags_parse() {
    let cli = Cli::try_parse_from([
        "colcrypt", "analyze", "--facts", "facts.json", "--format", "json",
    ])
    .unwrap();
    match cli.command {
        Commands::Analyze { facts, format, .. } => {
            assert_eq!(facts.to_str().unwrap(), "facts.json");
            assert_eq!(format, "json");
        }
        other => panic!("expected analyze, got {other:?}"),
    }
}

#[test]
fn modify_dry_run_and_workers_parse() {
    let cli = Cli::try_parse_from([
        "colcrypt", "modify", "--facts", "facts.json", "--dry-run", "--workers", "8",
    ])
    .unwrap();
    match cli.command {
        Commands::Modify {
            dry_run, workers, ..
        } => {
            assert!(dry_run);
            assert_eq!(workers, Some(8));
        }
        other => panic!("expected modify, got {other:?}"),
    }
}

#[test]
fn zero_workers_rejected() {
    let result = Cli::try_parse_from([
        "colcrypt", "modify", "--facts", "facts.json", "--workers", "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn invalid_format_rejected() {
    let result = Cli::try_parse_from([
        "colcrypt", "analyze", "--facts", "facts.json", "--format", "yaml",
    ]);
    assert!(result.is_err());
}

#[test]
fn config_loads_from_repo_root() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("colcrypt.toml"),
        r#"
            [[tables]]
            table = "employee"
            columns = ["ssn"]
        "#,
    )
    .unwrap();

    let config = Config::load(dir.path(), None).unwrap();
    assert_eq!(config.sensitive_columns().len(), 1);
}

#[test]
fn missing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(dir.path(), None).unwrap_err();
    assert!(err.to_string().contains("colcrypt.toml"));
}
