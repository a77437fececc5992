//! Whole-document JSON persistence
//!
//! Both persisted state files (the mapping document and the change-state
//! document) are full JSON documents rewritten in place, never append logs.
//! Loading tolerates a missing file; saving goes through the atomic writer.

use crate::{Error, NormalizedPath, Result, io};
use serde::{Serialize, de::DeserializeOwned};

/// Load a JSON document from a file.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load<T: DeserializeOwned>(path: &NormalizedPath) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = io::read_text(path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::DocumentParse {
            path: path.to_native(),
            message: e.to_string(),
        })
}

/// Save a JSON document to a file.
///
/// Uses atomic write to prevent corruption. Callers must serialize
/// concurrent writers to the same document.
pub fn save<T: Serialize>(path: &NormalizedPath, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| Error::DocumentSerialize {
        path: path.to_native(),
        message: e.to_string(),
    })?;
    io::write_atomic(path, content.as_bytes())
}
