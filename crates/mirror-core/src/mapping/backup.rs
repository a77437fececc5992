//! Project-local backup area.
//!
//! Keeps copies of uploaded content under `.mirror/backups/<local_path>`
//! so later diffing can use the last-uploaded baseline without re-fetching
//! it from the remote, plus timestamped copies of documents about to be
//! rewritten.

use crate::Result;
use chrono::Utc;
use mirror_fs::{MirrorPath, NormalizedPath, io};
use std::path::{Path, PathBuf};

/// Backup storage for one project.
#[derive(Debug, Clone)]
pub struct BackupArea {
    backups_dir: NormalizedPath,
}

impl BackupArea {
    /// Create the backup area handle for a project root.
    pub fn new(root_local: &Path) -> Self {
        let backups_dir = NormalizedPath::new(root_local)
            .join(MirrorPath::MetaDir.as_str())
            .join(MirrorPath::BackupsDir.as_str());
        Self { backups_dir }
    }

    /// Store a copy of `content` for a tracked file.
    ///
    /// The copy lives at `<backups>/<local_path>`, overwriting any
    /// previous copy for the same path.
    pub fn store(&self, local_path: &str, content: &[u8]) -> Result<()> {
        let target = self.backups_dir.join(local_path);
        io::write_atomic(&target, content)?;
        Ok(())
    }

    /// Read back the stored copy for a tracked file, if any.
    pub fn read(&self, local_path: &str) -> Option<Vec<u8>> {
        let target = self.backups_dir.join(local_path);
        std::fs::read(target.to_native()).ok()
    }

    /// Copy an existing document aside with a timestamp suffix before it
    /// gets rewritten. Returns the backup path, or `None` if the source
    /// does not exist.
    pub fn snapshot_document(&self, source: &Path) -> Result<Option<PathBuf>> {
        if !source.is_file() {
            return Ok(None);
        }
        let stem = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let stamped = format!("{}.{}", stem, Utc::now().format("%Y%m%dT%H%M%S%3f"));
        let target = self.backups_dir.join(&stamped).to_native();
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, &target)?;
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn store_and_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let area = BackupArea::new(temp.path());

        area.store("src/a.txt", b"original").unwrap();

        assert_eq!(area.read("src/a.txt").unwrap(), b"original");
        assert!(temp.path().join(".mirror/backups/src/a.txt").is_file());
    }

    #[test]
    fn read_missing_returns_none() {
        let temp = TempDir::new().unwrap();
        let area = BackupArea::new(temp.path());
        assert!(area.read("nope.txt").is_none());
    }

    #[test]
    fn snapshot_document_is_timestamped() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("mappings.json");
        std::fs::write(&doc, "{}").unwrap();

        let area = BackupArea::new(temp.path());
        let stored = area.snapshot_document(&doc).unwrap().unwrap();

        assert!(stored.is_file());
        assert!(
            stored
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("mappings.json.")
        );
        // Original left in place
        assert!(doc.is_file());
    }

    #[test]
    fn snapshot_missing_document_is_noop() {
        let temp = TempDir::new().unwrap();
        let area = BackupArea::new(temp.path());
        let result = area
            .snapshot_document(&temp.path().join("absent.json"))
            .unwrap();
        assert!(result.is_none());
    }
}
