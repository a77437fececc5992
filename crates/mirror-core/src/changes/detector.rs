//! Hash-based change detection.
//!
//! Classifies each mapped (and unmapped) local file as unchanged, modified,
//! added, or deleted relative to the mapping store. Hash comparison is the
//! authoritative signal; timestamps are only a cheap pre-filter, so mtime
//! churn alone never flags a file that has a content hash on record.

use super::state::{ChangeStatus, FileChange, ProjectChanges};
use crate::mapping::{MappingConfig, MappingStore, PathMapping};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use mirror_fs::{NormalizedPath, checksum, ignore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Tolerance for timestamp pre-filtering when no hash is on record.
const MTIME_TOLERANCE_MS: i64 = 2000;

/// Per-project change detector.
///
/// Holds the in-memory change set and a hash memo keyed by mtime so
/// unchanged files are not re-hashed on every pass.
pub struct ChangeDetector {
    root: PathBuf,
    changes: ProjectChanges,
    hash_cache: HashMap<String, (String, SystemTime)>,
}

impl ChangeDetector {
    /// Open the detector for a project root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProjectNotFound`] if `root` does not carry the
    /// mapping sentinel.
    pub fn open(root: &Path) -> Result<Self> {
        // Resolve symlinks so watcher events compare against the real path
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        if !MappingStore::is_project_root(&root) {
            return Err(Error::ProjectNotFound { path: root });
        }
        let changes = ProjectChanges::load(&root)?
            .unwrap_or_else(|| ProjectChanges::new(NormalizedPath::new(&root).as_str()));
        Ok(Self {
            root,
            changes,
            hash_cache: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current change set.
    pub fn changes(&self) -> &ProjectChanges {
        &self.changes
    }

    /// Full scan: re-classify every mapped entry, then sweep the working
    /// tree for unmapped additions. Persists the refreshed change state.
    pub fn scan(&mut self) -> Result<usize> {
        let count = self.evaluate()?;
        self.persist()?;
        Ok(count)
    }

    /// Classify everything without touching the change-state document.
    ///
    /// Used for read-only preconditions (a destructive sync checking for
    /// outstanding changes must not itself mutate the tree).
    pub fn evaluate(&mut self) -> Result<usize> {
        let config = MappingStore::load(&self.root)?.ok_or_else(|| Error::MappingNotFound {
            path: self.root.clone(),
        })?;

        for entry in &config.mappings {
            self.classify_mapped(entry);
        }

        let mut on_disk = Vec::new();
        collect_files(&self.root, &self.root, &mut on_disk);
        for rel in on_disk {
            if config.find(&rel).is_none() {
                self.classify_unmapped(&rel);
            }
        }

        self.changes.last_scan = Utc::now();
        Ok(self.changes.len())
    }

    /// Re-classify a single file after a filesystem event.
    ///
    /// Returns the file's new status, or `None` when it is unchanged (or
    /// excluded from tracking).
    pub fn reevaluate(&mut self, rel_path: &str) -> Result<Option<ChangeStatus>> {
        if ignore::is_ignored(rel_path) {
            return Ok(None);
        }
        let config = MappingStore::load(&self.root)?.ok_or_else(|| Error::MappingNotFound {
            path: self.root.clone(),
        })?;

        let status = match config.find(rel_path) {
            Some(entry) => self.classify_mapped(entry),
            None => self.classify_unmapped(rel_path),
        };
        Ok(status)
    }

    /// Drop a file from the change set after it has been synced.
    pub fn mark_synced(&mut self, rel_path: &str) {
        self.changes.remove(rel_path);
        self.hash_cache.remove(rel_path);
    }

    /// Clear the change set and persist the empty state.
    pub fn reset(&mut self) -> Result<()> {
        self.changes.clear();
        self.changes.last_scan = Utc::now();
        self.persist()
    }

    /// Persist the current change state.
    pub fn persist(&self) -> Result<()> {
        self.changes.save(&self.root)
    }

    fn classify_mapped(&mut self, entry: &PathMapping) -> Option<ChangeStatus> {
        let rel = entry.local_path.as_str();
        if ignore::is_ignored(rel) {
            return None;
        }
        let abs = self.root.join(rel);

        if !abs.is_file() {
            self.record(rel, ChangeStatus::Deleted, None, entry.content_hash.clone());
            return Some(ChangeStatus::Deleted);
        }

        let Some(current) = self.current_hash(rel, &abs) else {
            // Unreadable file: excluded from the change set
            self.changes.remove(rel);
            return None;
        };

        match &entry.content_hash {
            Some(original) if *original == current => {
                self.changes.remove(rel);
                None
            }
            Some(original) => {
                let original = original.clone();
                self.record(rel, ChangeStatus::Modified, Some(current), Some(original));
                Some(ChangeStatus::Modified)
            }
            None => self.classify_by_mtime(entry, rel, &abs, current),
        }
    }

    /// Timestamp fallback for entries with no hash on record.
    fn classify_by_mtime(
        &mut self,
        entry: &PathMapping,
        rel: &str,
        abs: &Path,
        current: String,
    ) -> Option<ChangeStatus> {
        let Some(baseline) = entry.local_modified_at_download else {
            debug!(path = rel, "no hash and no baseline; skipping classification");
            self.changes.remove(rel);
            return None;
        };
        let mtime: DateTime<Utc> = match std::fs::metadata(abs).and_then(|m| m.modified()) {
            Ok(t) => t.into(),
            Err(e) => {
                warn!(path = rel, error = %e, "failed to read mtime");
                self.changes.remove(rel);
                return None;
            }
        };
        if (mtime - baseline).num_milliseconds() > MTIME_TOLERANCE_MS {
            self.record(rel, ChangeStatus::Modified, Some(current), None);
            Some(ChangeStatus::Modified)
        } else {
            self.changes.remove(rel);
            None
        }
    }

    fn classify_unmapped(&mut self, rel: &str) -> Option<ChangeStatus> {
        let abs = self.root.join(rel);
        if !abs.is_file() {
            self.changes.remove(rel);
            return None;
        }
        let current = self.current_hash(rel, &abs);
        self.record(rel, ChangeStatus::Added, current, None);
        Some(ChangeStatus::Added)
    }

    fn record(
        &mut self,
        rel: &str,
        status: ChangeStatus,
        hash: Option<String>,
        original_hash: Option<String>,
    ) {
        self.changes.upsert(FileChange {
            path: rel.to_string(),
            status,
            hash,
            original_hash,
            timestamp: Utc::now(),
        });
    }

    /// Hash a file, reusing the memoized digest when the mtime is
    /// unchanged since the last computation.
    fn current_hash(&mut self, rel: &str, abs: &Path) -> Option<String> {
        let mtime = std::fs::metadata(abs).and_then(|m| m.modified()).ok()?;
        if let Some((digest, cached_mtime)) = self.hash_cache.get(rel)
            && *cached_mtime == mtime
        {
            return Some(digest.clone());
        }
        let digest = if ignore::is_binary_path(rel) {
            checksum::compute_file_proxy_checksum(abs).ok()?
        } else {
            checksum::compute_file_checksum(abs).ok()?
        };
        self.hash_cache
            .insert(rel.to_string(), (digest.clone(), mtime));
        Some(digest)
    }
}

/// Recursively collect tracked files under `dir` as normalized relative
/// paths, applying the ignore policy to both directories and files.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read directory during scan");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let rel = match NormalizedPath::new(&path).strip_prefix(&NormalizedPath::new(root)) {
            Some(rel) => rel.to_string(),
            None => continue,
        };
        if ignore::is_ignored(&rel) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.is_dir() => collect_files(root, &path, out),
            Ok(meta) if meta.is_file() => out.push(rel),
            _ => {}
        }
    }
}
