//! Per-process project registry.
//!
//! One logical owner per project: components resolve project roots through
//! this registry instead of consulting hidden global state. Resolution
//! results are memoized per directory to avoid repeated ancestor walks.

use crate::guard::BulkTransferLock;
use crate::mapping::MappingStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Registry of known project roots, keyed by directory.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    /// Memoized resolution: directory -> nearest project root (if any)
    cache: Mutex<HashMap<PathBuf, Option<PathBuf>>>,
    /// Process-wide bulk transfer slot
    bulk_lock: BulkTransferLock,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the project root containing `path`, walking ancestors for
    /// the mapping sentinel. Memoized per starting directory.
    pub fn resolve_project_root(&self, path: &Path) -> Option<PathBuf> {
        let start = if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent()?.to_path_buf()
        };

        {
            let cache = self.cache.lock().expect("registry cache mutex poisoned");
            if let Some(cached) = cache.get(&start) {
                return cached.clone();
            }
        }

        let resolved = MappingStore::find_nearest_config(&start);
        self.cache
            .lock()
            .expect("registry cache mutex poisoned")
            .insert(start, resolved.clone());
        resolved
    }

    /// Drop memoized results under `root` after a project is created,
    /// replaced, or deleted.
    pub fn invalidate(&self, root: &Path) {
        let root_norm = mirror_fs::NormalizedPath::new(root);
        let mut cache = self.cache.lock().expect("registry cache mutex poisoned");
        cache.retain(|dir, _| {
            let dir_norm = mirror_fs::NormalizedPath::new(dir);
            dir_norm.strip_prefix(&root_norm).is_none()
        });
    }

    /// The process-wide bulk transfer lock.
    pub fn bulk_lock(&self) -> &BulkTransferLock {
        &self.bulk_lock
    }
}
