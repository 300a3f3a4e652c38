//! Grouping impacted files into bounded work units
//!
//! Assignment is greedy and stable: files are consumed in input order, and
//! a file joins the current batch unless that would exceed the file-count
//! or combined-size limit, in which case the batch closes and a new one
//! opens with that file. A single file over the size limit still gets its
//! own batch; nothing is dropped. Indices start at zero in creation order,
//! so batch layout is reproducible across runs.

use crate::models::Batch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    pub max_files: usize,
    pub max_bytes: u64,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_files: 8,
            max_bytes: 256 * 1024,
        }
    }
}

pub struct BatchPlanner {
    limits: BatchLimits,
}

impl BatchPlanner {
    pub fn new(limits: BatchLimits) -> Self {
        Self { limits }
    }

    /// Plan batches by reading file sizes from disk. A missing file counts
    /// as zero bytes and is kept; the patch pipeline will surface the read
    /// failure with full context.
    pub fn plan(&self, root: &Path, files: &[PathBuf]) -> Vec<Batch> {
        let sized: Vec<(PathBuf, u64)> = files
            .iter()
            .map(|f| {
                let size = std::fs::metadata(root.join(f))
                    .map(|m| m.len())
                    .unwrap_or_else(|e| {
                        warn!("cannot stat {}: {e}", f.display());
                        0
                    });
                (f.clone(), size)
            })
            .collect();
        self.plan_sized(&sized)
    }

    /// Plan batches from pre-measured (file, size) pairs.
    pub fn plan_sized(&self, files: &[(PathBuf, u64)]) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        let mut current: Vec<PathBuf> = Vec::new();
        let mut current_bytes: u64 = 0;

        for (file, size) in files {
            let over_files = current.len() + 1 > self.limits.max_files;
            let over_bytes = current_bytes + size > self.limits.max_bytes;
            if !current.is_empty() && (over_files || over_bytes) {
                batches.push(Batch {
                    index: batches.len(),
                    files: std::mem::take(&mut current),
                });
                current_bytes = 0;
            }
            current.push(file.clone());
            current_bytes += size;
        }
        if !current.is_empty() {
            batches.push(Batch {
                index: batches.len(),
                files: current,
            });
        }
        batches
    }
}
