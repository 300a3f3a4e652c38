//! Append-only modification log
//!
//! One finalized record per file per run. Workers hand finished records to
//! the tracker, which appends under a single lock, the one ordering
//! authority for finalization. Records are never mutated after appending;
//! a second finalization attempt for the same file is a bug upstream and is
//! rejected loudly rather than overwritten.

use crate::models::{ModificationRecord, ModificationStatus};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

#[derive(Default)]
struct TrackerInner {
    records: Vec<ModificationRecord>,
    finalized_files: FxHashSet<PathBuf>,
}

/// Counts by final status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub applied: usize,
    pub failed: usize,
    pub rolled_back: usize,
    pub pending: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: ModificationStatus) {
        match status {
            ModificationStatus::Applied => self.applied += 1,
            ModificationStatus::Failed => self.failed += 1,
            ModificationStatus::RolledBack => self.rolled_back += 1,
            ModificationStatus::Pending => self.pending += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.failed + self.rolled_back + self.pending
    }
}

/// Aggregate view over all finalized records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerSummary {
    pub by_status: StatusCounts,
    /// Keyed by "table.column".
    pub by_context: BTreeMap<String, StatusCounts>,
    /// retry count → number of files that needed that many retries.
    pub retry_distribution: BTreeMap<u32, usize>,
}

/// The append-only result log for one run.
#[derive(Default)]
pub struct ResultTracker {
    inner: Mutex<TrackerInner>,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized record. Returns false (and keeps the first
    /// record) if the file was already finalized this run.
    pub fn finalize(&self, mut record: ModificationRecord) -> bool {
        debug_assert_ne!(
            record.status,
            ModificationStatus::Pending,
            "finalize called with a pending record"
        );
        let mut inner = self.inner.lock().expect("tracker lock poisoned");
        if !inner.finalized_files.insert(record.file.clone()) {
            warn!(
                "duplicate finalization for {} ignored (first record wins)",
                record.file.display()
            );
            return false;
        }
        record.finalized_at = Some(chrono::Utc::now());
        inner.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("tracker lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone out the log in append order.
    pub fn records(&self) -> Vec<ModificationRecord> {
        self.inner
            .lock()
            .expect("tracker lock poisoned")
            .records
            .clone()
    }

    /// Aggregate counts by status, by table/column context, and by retry
    /// count.
    pub fn summary(&self) -> TrackerSummary {
        let inner = self.inner.lock().expect("tracker lock poisoned");
        let mut summary = TrackerSummary::default();
        for record in &inner.records {
            summary.by_status.bump(record.status);
            for ctx in &record.contexts {
                summary
                    .by_context
                    .entry(ctx.to_string())
                    .or_default()
                    .bump(record.status);
            }
            *summary
                .retry_distribution
                .entry(record.retry_count)
                .or_default() += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TableColumn;

    fn record(file: &str, status: ModificationStatus, retries: u32) -> ModificationRecord {
        let mut r = ModificationRecord::pending(
            file.into(),
            vec![TableColumn::new("employee", "ssn")],
        );
        r.status = status;
        r.retry_count = retries;
        r
    }

    #[test]
    fn test_append_and_summary() {
        let tracker = ResultTracker::new();
        assert!(tracker.finalize(record("a.java", ModificationStatus::Applied, 0)));
        assert!(tracker.finalize(record("b.java", ModificationStatus::Failed, 3)));
        assert!(tracker.finalize(record("c.java", ModificationStatus::RolledBack, 1)));

        let summary = tracker.summary();
        assert_eq!(summary.by_status.applied, 1);
        assert_eq!(summary.by_status.failed, 1);
        assert_eq!(summary.by_status.rolled_back, 1);
        assert_eq!(summary.by_status.total(), 3);
        assert_eq!(summary.by_context["employee.ssn"].total(), 3);
        assert_eq!(summary.retry_distribution[&0], 1);
        assert_eq!(summary.retry_distribution[&3], 1);
    }

    #[test]
    fn test_duplicate_finalization_rejected() {
        let tracker = ResultTracker::new();
        assert!(tracker.finalize(record("a.java", ModificationStatus::Applied, 0)));
        assert!(!tracker.finalize(record("a.java", ModificationStatus::Failed, 2)));

        let records = tracker.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ModificationStatus::Applied);
    }

    #[test]
    fn test_records_preserve_append_order() {
        let tracker = ResultTracker::new();
        tracker.finalize(record("a.java", ModificationStatus::Applied, 0));
        tracker.finalize(record("b.java", ModificationStatus::Applied, 0));
        let files: Vec<_> = tracker.records().into_iter().map(|r| r.file).collect();
        assert_eq!(files, vec![PathBuf::from("a.java"), "b.java".into()]);
    }

    #[test]
    fn test_finalized_at_stamped() {
        let tracker = ResultTracker::new();
        tracker.finalize(record("a.java", ModificationStatus::Applied, 0));
        assert!(tracker.records()[0].finalized_at.is_some());
    }
}
