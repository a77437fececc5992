//! Command implementations for mirror-cli

pub mod download;
pub mod status;
pub mod sync;
pub mod verify;

pub use download::run_download;
pub use status::{run_reset, run_status};
pub use sync::{run_push, run_resync, run_sync};
pub use verify::run_verify;

use crate::error::{CliError, Result};
use mirror_core::MappingStore;
use std::path::{Path, PathBuf};

/// Resolve the project root containing `path` via the ancestor walk.
pub(crate) fn resolve_project(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    MappingStore::find_nearest_config(&absolute).ok_or_else(|| {
        CliError::user(format!(
            "No project found containing {} (missing .mirror/mapping.json)",
            absolute.display()
        ))
    })
}
