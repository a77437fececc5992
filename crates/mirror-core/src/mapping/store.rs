//! Mapping document persistence and project resolution.

use super::{BackupArea, MappingConfig, PathMapping};
use crate::{Error, Result};
use chrono::Utc;
use mirror_fs::{MirrorPath, NormalizedPath, checksum, document, ignore};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path-based operations over per-project mapping documents.
///
/// All writes are whole-file JSON rewrites through the atomic writer.
/// Concurrent writers to the same document are not supported; callers
/// serialize upserts.
pub struct MappingStore;

impl MappingStore {
    /// Path of the mapping document for a project root.
    pub fn mapping_path(root_local: &Path) -> NormalizedPath {
        NormalizedPath::new(root_local)
            .join(MirrorPath::MetaDir.as_str())
            .join(MirrorPath::MappingFile.as_str())
    }

    /// Whether `dir` carries the mapping sentinel.
    pub fn is_project_root(dir: &Path) -> bool {
        Self::mapping_path(dir).is_file()
    }

    /// Create and persist a fresh mapping document for a project.
    pub fn create(
        root_local: &Path,
        root_remote: &str,
        entries: Vec<PathMapping>,
    ) -> Result<MappingConfig> {
        let config = MappingConfig::new(
            NormalizedPath::new(root_local).as_str(),
            root_remote,
            entries,
        );
        Self::save(root_local, &config)?;
        Ok(config)
    }

    /// Load the mapping document for a project root, if present.
    pub fn load(root_local: &Path) -> Result<Option<MappingConfig>> {
        Ok(document::load(&Self::mapping_path(root_local))?)
    }

    /// Persist the mapping document for a project root.
    pub fn save(root_local: &Path, config: &MappingConfig) -> Result<()> {
        document::save(&Self::mapping_path(root_local), config)?;
        Ok(())
    }

    /// Insert or update one mapping entry.
    ///
    /// When `content` is given the entry's hash is recomputed from it, and
    /// the same content is copied into the project backup area so later
    /// diffing does not require re-fetching it from the remote.
    pub fn upsert(
        root_local: &Path,
        local_path: &str,
        remote_path: &str,
        content: Option<&[u8]>,
    ) -> Result<()> {
        let mut config = Self::load(root_local)?.ok_or_else(|| Error::MappingNotFound {
            path: root_local.to_path_buf(),
        })?;

        let is_binary = ignore::is_binary_path(local_path);
        let content_hash = match content {
            Some(bytes) => {
                BackupArea::new(root_local).store(local_path, bytes)?;
                if is_binary {
                    let abs = root_local.join(local_path);
                    checksum::compute_file_proxy_checksum(&abs).ok()
                } else {
                    Some(checksum::compute_checksum(bytes))
                }
            }
            None => config.find(local_path).and_then(|m| m.content_hash.clone()),
        };

        let previous = config.find(local_path);
        let entry = PathMapping {
            local_path: local_path.to_string(),
            remote_path: remote_path.to_string(),
            last_updated: Utc::now(),
            content_hash,
            server_modified: previous.and_then(|m| m.server_modified),
            local_modified_at_download: previous.and_then(|m| m.local_modified_at_download),
            is_binary,
        };
        config.upsert(entry);
        Self::save(root_local, &config)
    }

    /// Walk ancestor directories until one carries the mapping sentinel.
    ///
    /// This defines project boundaries for every other component.
    pub fn find_nearest_config(path: &Path) -> Option<PathBuf> {
        let mut current = if path.is_dir() {
            Some(path)
        } else {
            path.parent()
        };
        while let Some(dir) = current {
            if Self::is_project_root(dir) {
                return Some(dir.to_path_buf());
            }
            current = dir.parent();
        }
        None
    }

    /// Resolve a local file path to its remote counterpart.
    ///
    /// Exact mapping matches win; the project root resolves to the root
    /// remote path; anything else falls back to `root_remote + "/" + rel`,
    /// never reinterpreting the path through unrelated configuration.
    pub fn resolve_remote_path(local_file: &Path) -> Result<Option<String>> {
        let Some(root) = Self::find_nearest_config(local_file) else {
            debug!(path = %local_file.display(), "no project found for path");
            return Ok(None);
        };
        let Some(config) = Self::load(&root)? else {
            return Ok(None);
        };

        let file = NormalizedPath::new(local_file);
        let root_norm = NormalizedPath::new(&root);
        let Some(rel) = file.strip_prefix(&root_norm) else {
            return Ok(None);
        };
        if rel.is_empty() {
            return Ok(Some(config.root_remote_path.clone()));
        }
        if let Some(entry) = config.find(rel) {
            return Ok(Some(entry.remote_path.clone()));
        }
        Ok(Some(format!(
            "{}/{}",
            config.root_remote_path.trim_end_matches('/'),
            rel
        )))
    }
}
