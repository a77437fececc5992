//! Persisted change-tracking state.
//!
//! The change-state document (`.mirror/changes.json`) is decoupled from the
//! mapping document so it can be reset independently.

use crate::Result;
use chrono::{DateTime, Utc};
use mirror_fs::{MirrorPath, NormalizedPath, document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Classification of one local file relative to its mapping baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Modified,
    Added,
    Deleted,
}

/// One local file's divergence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Path relative to the project root
    pub path: String,
    pub status: ChangeStatus,
    /// Current content hash; absent for deleted or unreadable files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Hash recorded in the mapping at the time of classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// All outstanding changes for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectChanges {
    pub project_path: String,
    pub last_scan: DateTime<Utc>,
    /// Keyed by relative path; last write wins
    pub files: HashMap<String, FileChange>,
}

impl ProjectChanges {
    pub fn new(project_path: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            last_scan: Utc::now(),
            files: HashMap::new(),
        }
    }

    fn changes_path(root_local: &Path) -> NormalizedPath {
        NormalizedPath::new(root_local)
            .join(MirrorPath::MetaDir.as_str())
            .join(MirrorPath::ChangesFile.as_str())
    }

    /// Load the change-state document for a project, if present.
    pub fn load(root_local: &Path) -> Result<Option<Self>> {
        Ok(document::load(&Self::changes_path(root_local))?)
    }

    /// Persist the change-state document.
    pub fn save(&self, root_local: &Path) -> Result<()> {
        document::save(&Self::changes_path(root_local), self)?;
        Ok(())
    }

    /// Record a change, replacing any previous record for the same path.
    pub fn upsert(&mut self, change: FileChange) {
        self.files.insert(change.path.clone(), change);
    }

    /// Drop the record for a path, if any.
    pub fn remove(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}
