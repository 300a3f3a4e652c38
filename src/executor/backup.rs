//! Per-file backup snapshots
//!
//! Every file gets an immutable snapshot of its content before the first
//! apply attempt. Snapshots are content-checksummed on write and verified
//! on read: restoring from a snapshot that no longer matches its checksum
//! would silently hand back the wrong bytes, so that case is
//! `BackupRestoreFailed` and fatal to the run.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Handle to one snapshot. Serializable so records can reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRef {
    pub id: String,
    pub path: PathBuf,
    pub checksum: String,
}

/// On-disk snapshot store for one run. Snapshots are per file and never
/// shared; file-level exclusivity is the only locking needed.
pub struct BackupStore {
    dir: PathBuf,
}

fn checksum(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl BackupStore {
    pub fn new(dir: PathBuf) -> EngineResult<Self> {
        std::fs::create_dir_all(&dir).map_err(|source| EngineError::Io {
            file: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Snapshot `content` as the pre-modification state of `file`.
    pub fn snapshot(&self, file: &Path, content: &str) -> EngineResult<BackupRef> {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{id}.bak"));
        std::fs::write(&path, content).map_err(|source| EngineError::Io {
            file: path.clone(),
            source,
        })?;
        debug!("backed up {} to {}", file.display(), path.display());
        Ok(BackupRef {
            id,
            path,
            checksum: checksum(content),
        })
    }

    /// Read a snapshot back, verifying its checksum.
    pub fn read(&self, file: &Path, backup: &BackupRef) -> EngineResult<String> {
        let content =
            std::fs::read_to_string(&backup.path).map_err(|e| EngineError::BackupRestoreFailed {
                file: file.to_path_buf(),
                snapshot: backup.id.clone(),
                detail: format!("cannot read snapshot: {e}"),
            })?;
        if checksum(&content) != backup.checksum {
            return Err(EngineError::BackupRestoreFailed {
                file: file.to_path_buf(),
                snapshot: backup.id.clone(),
                detail: "snapshot checksum mismatch".to_string(),
            });
        }
        Ok(content)
    }

    /// Restore `file` to its snapshotted content, byte for byte.
    pub fn restore(&self, file: &Path, backup: &BackupRef) -> EngineResult<()> {
        let content = self.read(file, backup)?;
        std::fs::write(file, &content).map_err(|e| EngineError::BackupRestoreFailed {
            file: file.to_path_buf(),
            snapshot: backup.id.clone(),
            detail: format!("cannot write restored content: {e}"),
        })?;
        debug!("restored {} from snapshot {}", file.display(), backup.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_and_restore_roundtrip() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path().join("backups")).unwrap();

        let target = dir.path().join("Dao.java");
        std::fs::write(&target, "original\n").unwrap();

        let backup = store.snapshot(&target, "original\n").unwrap();
        std::fs::write(&target, "mangled\n").unwrap();

        store.restore(&target, &backup).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "original\n");
    }

    #[test]
    fn test_tampered_snapshot_is_fatal() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path().join("backups")).unwrap();
        let target = dir.path().join("Dao.java");

        let backup = store.snapshot(&target, "original\n").unwrap();
        std::fs::write(&backup.path, "tampered\n").unwrap();

        let err = store.restore(&target, &backup).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_snapshot_is_fatal() {
        let dir = tempdir().unwrap();
        let store = BackupStore::new(dir.path().join("backups")).unwrap();
        let target = dir.path().join("Dao.java");

        let backup = store.snapshot(&target, "original\n").unwrap();
        std::fs::remove_file(&backup.path).unwrap();

        let err = store.read(&target, &backup).unwrap_err();
        assert!(matches!(err, EngineError::BackupRestoreFailed { .. }));
    }
}
