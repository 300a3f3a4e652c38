//! Fact intake from the parsing front end
//!
//! The front end (Java/XML parsers, run as a separate tool) emits one JSON
//! document per analysis run: method facts with their call sites, per-file
//! import scopes, and SQL table/column accesses from the mapping files.
//! The engine consumes this document and never touches source syntax itself.

use crate::models::{MethodKey, Parameter, RouteMarker, TableAccessFact};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Import scope of one source file, as reported by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFact {
    pub path: PathBuf,
    #[serde(default)]
    pub imports: Vec<String>,
}

/// A call site inside a method body.
///
/// `receiver_type` is the front end's best guess at the declaring type of
/// the callee (from a local variable or field declaration); it is absent
/// when the receiver could not be typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSiteFact {
    #[serde(default)]
    pub receiver_type: Option<String>,
    pub callee_name: String,
    pub arg_count: usize,
    pub line: u32,
}

/// One parsed method with its call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodFact {
    pub type_name: String,
    pub method_name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    pub file: PathBuf,
    #[serde(default)]
    pub route_markers: Vec<RouteMarker>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub call_sites: Vec<CallSiteFact>,
}

fn default_return_type() -> String {
    "void".to_string()
}

impl MethodFact {
    pub fn key(&self) -> MethodKey {
        MethodKey::new(
            self.type_name.clone(),
            self.method_name.clone(),
            self.parameters.len(),
        )
    }
}

/// The full fact set for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactSet {
    #[serde(default)]
    pub files: Vec<FileFact>,
    #[serde(default)]
    pub methods: Vec<MethodFact>,
    #[serde(default)]
    pub accesses: Vec<TableAccessFact>,
}

impl FactSet {
    /// Load a fact set from the front end's JSON output.
    pub fn from_json_file(path: &Path) -> Result<FactSet> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fact file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fact file {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.accesses.is_empty()
    }
}
