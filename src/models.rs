//! Core data models for colcrypt
//!
//! These models are used throughout the codebase for representing
//! method facts, call-graph entities, impact paths, and modification
//! outcomes. Everything report-facing keeps stable serde field names so
//! reports from consecutive runs can be diffed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Generate a deterministic record ID based on content hash.
///
/// Stable IDs across runs enable tracking a file's modification outcome
/// over time and reliable deduplication in reports.
///
/// The ID is a 16-character hex string derived from hashing the file path
/// and the (table, column) contexts that put the file in scope.
pub fn deterministic_record_id(file: &str, contexts: &[TableColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    for ctx in contexts {
        hasher.update(b"\n");
        hasher.update(ctx.table.as_bytes());
        hasher.update(b".");
        hasher.update(ctx.column.as_bytes());
    }
    let digest = hasher.finalize();
    let mut s = String::with_capacity(16);
    for b in digest.iter().take(8) {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Identity of a method within the call graph.
///
/// Overloads that differ only in parameter types share a key on purpose:
/// the front end cannot always resolve full signatures, so identity is
/// (type, name, arity) and ambiguity is handled at edge-resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    pub type_name: String,
    pub method_name: String,
    pub arity: usize,
}

impl MethodKey {
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>, arity: usize) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
            arity,
        }
    }
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}/{}", self.type_name, self.method_name, self.arity)
    }
}

/// A method parameter (name + declared type, in declaration order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A network-facing route attached to a method (verb + path template).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMarker {
    pub verb: String,
    pub path: String,
}

/// Architectural layer a method belongs to.
///
/// Derived from annotations first, then from type-name suffix conventions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Controller,
    Service,
    Dao,
    Repository,
    Mapper,
    Entity,
    #[default]
    Unknown,
}

impl Layer {
    /// Classify from annotation names, falling back to type-name suffix.
    pub fn classify(annotations: &[String], type_name: &str) -> Layer {
        for ann in annotations {
            let ann = ann.to_lowercase();
            if ann.contains("controller") {
                return Layer::Controller;
            }
            if ann.contains("service") {
                return Layer::Service;
            }
            if ann.contains("mapper") {
                return Layer::Mapper;
            }
            if ann.contains("repository") {
                return Layer::Repository;
            }
            if ann.contains("entity") || ann.contains("table") {
                return Layer::Entity;
            }
        }
        let lower = type_name.to_lowercase();
        if lower.ends_with("controller") {
            Layer::Controller
        } else if lower.ends_with("service") || lower.ends_with("serviceimpl") {
            Layer::Service
        } else if lower.ends_with("dao") || lower.ends_with("daoimpl") {
            Layer::Dao
        } else if lower.ends_with("repository") {
            Layer::Repository
        } else if lower.ends_with("mapper") {
            Layer::Mapper
        } else {
            Layer::Unknown
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Controller => write!(f, "controller"),
            Layer::Service => write!(f, "service"),
            Layer::Dao => write!(f, "dao"),
            Layer::Repository => write!(f, "repository"),
            Layer::Mapper => write!(f, "mapper"),
            Layer::Entity => write!(f, "entity"),
            Layer::Unknown => write!(f, "unknown"),
        }
    }
}

/// A method node in the call graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodNode {
    pub type_name: String,
    pub method_name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: String,
    pub file: PathBuf,
    #[serde(default)]
    pub route_markers: Vec<RouteMarker>,
    #[serde(default)]
    pub layer: Layer,
}

impl MethodNode {
    pub fn key(&self) -> MethodKey {
        MethodKey::new(
            self.type_name.clone(),
            self.method_name.clone(),
            self.parameters.len(),
        )
    }

    /// A method is an entry point when it carries at least one route marker.
    pub fn is_entry_point(&self) -> bool {
        !self.route_markers.is_empty()
    }
}

/// Where a call site occurs in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteLocation {
    pub file: PathBuf,
    pub line: u32,
}

/// Kind of access a SQL statement performs on a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
        }
    }
}

/// A SQL table/column access extracted by the mapping front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableAccessFact {
    pub table: String,
    pub column: String,
    pub access_kind: AccessKind,
    pub owner: MethodKey,
    pub statement_ref: String,
}

/// A (table, column) pair; matching is case-insensitive via `normalized`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableColumn {
    pub table: String,
    pub column: String,
}

impl TableColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Normalized form used as a lookup key.
    pub fn normalized(&self) -> TableColumn {
        TableColumn {
            table: self.table.to_lowercase(),
            column: self.column.to_lowercase(),
        }
    }
}

impl std::fmt::Display for TableColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// One complete call chain from an entry point (or caller-less root) down
/// to a data-access point, for one configured (table, column).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactPath {
    pub table: String,
    pub column: String,
    /// Root-to-leaf: entry point first, data-access method last.
    pub chain: Vec<MethodKey>,
    /// Distinct files spanned by the chain, in chain order.
    pub files: Vec<PathBuf>,
    /// True when the chain terminates at a route-marked method.
    pub externally_reachable: bool,
}

/// A bounded unit of modification work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub files: Vec<PathBuf>,
}

/// A machine-generated edit for one file, not yet validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchProposal {
    pub file: PathBuf,
    pub edit_text: String,
    pub batch_index: usize,
}

/// Final status of a file's modification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    #[default]
    Pending,
    Applied,
    Failed,
    RolledBack,
}

impl std::fmt::Display for ModificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModificationStatus::Pending => write!(f, "pending"),
            ModificationStatus::Applied => write!(f, "applied"),
            ModificationStatus::Failed => write!(f, "failed"),
            ModificationStatus::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// Per-file outcome of one modification run.
///
/// Created at batch dispatch time, finalized exactly once by the retry
/// controller. `applied` always has a readable backup snapshot behind it;
/// `rolled_back` means the file is byte-identical to that snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationRecord {
    #[serde(default)]
    pub id: String,
    pub file: PathBuf,
    /// The (table, column) pairs whose impact sets put this file in scope.
    pub contexts: Vec<TableColumn>,
    pub status: ModificationStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub backup: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Unified diff of the would-be change; populated in dry-run mode only.
    #[serde(default)]
    pub dry_run_diff: Option<String>,
    #[serde(default)]
    pub finalized_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ModificationRecord {
    pub fn pending(file: PathBuf, contexts: Vec<TableColumn>) -> Self {
        let id = deterministic_record_id(&file.to_string_lossy(), &contexts);
        Self {
            id,
            file,
            contexts,
            status: ModificationStatus::Pending,
            retry_count: 0,
            backup: None,
            failure_reason: None,
            dry_run_diff: None,
            finalized_at: None,
        }
    }
}
