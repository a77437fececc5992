//! Legacy flat mapping document.
//!
//! Older projects carry a flat `mappings.json` at the project root mapping
//! local relative paths straight to remote paths. Sync operations keep it
//! mirrored with the current document so older tooling stays usable, taking
//! a timestamped backup before every rewrite.

use super::BackupArea;
use crate::Result;
use mirror_fs::{MirrorPath, NormalizedPath, document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// The legacy flat document: `local_path -> remote_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyMappingDoc {
    pub mappings: BTreeMap<String, String>,
}

impl LegacyMappingDoc {
    fn path_for(root_local: &Path) -> NormalizedPath {
        NormalizedPath::new(root_local).join(MirrorPath::LegacyMappingFile.as_str())
    }

    /// Whether the project carries a legacy document.
    pub fn exists(root_local: &Path) -> bool {
        Self::path_for(root_local).is_file()
    }

    /// Load the legacy document, if present.
    pub fn load(root_local: &Path) -> Result<Option<Self>> {
        Ok(document::load(&Self::path_for(root_local))?)
    }

    /// Mirror a batch of changes into the legacy document, if one exists.
    ///
    /// Takes a timestamped backup of the previous version first. Absent
    /// documents are left absent; this never creates the legacy format.
    pub fn patch(
        root_local: &Path,
        updated: &[(String, String)],
        removed: &[String],
    ) -> Result<()> {
        let path = Self::path_for(root_local);
        let Some(mut doc) = document::load::<Self>(&path)? else {
            return Ok(());
        };

        BackupArea::new(root_local).snapshot_document(&path.to_native())?;

        for (local, remote) in updated {
            doc.mappings.insert(local.clone(), remote.clone());
        }
        for local in removed {
            doc.mappings.remove(local);
        }

        document::save(&path, &doc)?;
        debug!(
            updated = updated.len(),
            removed = removed.len(),
            "patched legacy mapping document"
        );
        Ok(())
    }
}
