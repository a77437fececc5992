//! Local↔remote path mapping records.
//!
//! One [`MappingConfig`] is persisted per project root as a whole JSON
//! document (`.mirror/mapping.json`). Its presence is the project sentinel:
//! a directory is a project iff that file exists.

mod backup;
mod legacy;
mod store;

pub use backup::BackupArea;
pub use legacy::LegacyMappingDoc;
pub use store::MappingStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current version of the mapping document format.
pub const MAPPING_VERSION: u32 = 2;

/// The record linking one local relative path to one remote absolute path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMapping {
    /// Path relative to the project root, forward-slash normalized
    pub local_path: String,
    /// Absolute remote path
    pub remote_path: String,
    /// Write timestamp of this mapping entry
    pub last_updated: DateTime<Utc>,
    /// `sha256:<hex>` of raw bytes for text; proxy digest for binary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Remote modification time as of the last successful sync/download
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_modified: Option<DateTime<Utc>>,
    /// Local mtime immediately after the file was written by a sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_modified_at_download: Option<DateTime<Utc>>,
    /// Extension-derived binary classification
    #[serde(default)]
    pub is_binary: bool,
}

impl PathMapping {
    /// Baseline timestamp for remote-change detection:
    /// `server_modified`, falling back to `local_modified_at_download`.
    pub fn baseline(&self) -> Option<DateTime<Utc>> {
        self.server_modified.or(self.local_modified_at_download)
    }
}

/// The persisted mapping document for one project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    /// Absolute remote path this project mirrors
    pub root_remote_path: String,
    /// Absolute local path of the project root
    pub root_local_path: String,
    /// Document format version
    pub version: u32,
    /// Creation time of this document
    pub created_at: DateTime<Utc>,
    /// Mapping entries, unique by `local_path`
    pub mappings: Vec<PathMapping>,
}

impl MappingConfig {
    /// Create a new document for a project.
    pub fn new(
        root_local_path: impl Into<String>,
        root_remote_path: impl Into<String>,
        mappings: Vec<PathMapping>,
    ) -> Self {
        Self {
            root_remote_path: root_remote_path.into(),
            root_local_path: root_local_path.into(),
            version: MAPPING_VERSION,
            created_at: Utc::now(),
            mappings,
        }
    }

    /// Find an entry by its local relative path.
    pub fn find(&self, local_path: &str) -> Option<&PathMapping> {
        self.mappings.iter().find(|m| m.local_path == local_path)
    }

    /// Find an entry by its normalized remote path key.
    pub fn find_by_remote(&self, remote_key: &str) -> Option<&PathMapping> {
        self.mappings
            .iter()
            .find(|m| mirror_fs::normalize_remote_path(&m.remote_path) == remote_key)
    }

    /// Insert or replace an entry, keeping `local_path` unique.
    pub fn upsert(&mut self, entry: PathMapping) {
        if let Some(existing) = self
            .mappings
            .iter_mut()
            .find(|m| m.local_path == entry.local_path)
        {
            *existing = entry;
        } else {
            self.mappings.push(entry);
        }
    }

    /// Remove an entry by local path. Returns whether one was removed.
    pub fn remove(&mut self, local_path: &str) -> bool {
        let before = self.mappings.len();
        self.mappings.retain(|m| m.local_path != local_path);
        self.mappings.len() != before
    }
}
