//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! change detection and integrity verification. Binary files use a cheap
//! proxy digest over `size + mtime` instead of hashing their content.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(compute_checksum(&content))
}

/// Compute the proxy checksum for a binary file from its size and mtime.
///
/// Content is never read; the digest covers the `size:mtime_ms` pair only.
pub fn compute_proxy_checksum(size: u64, mtime: SystemTime) -> String {
    let mtime_ms = mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    compute_checksum(format!("{}:{}", size, mtime_ms).as_bytes())
}

/// Compute the proxy checksum for a binary file on disk.
///
/// # Errors
///
/// Returns an error if the file metadata cannot be read.
pub fn compute_file_proxy_checksum(path: &Path) -> std::io::Result<String> {
    let meta = std::fs::metadata(path)?;
    Ok(compute_proxy_checksum(meta.len(), meta.modified()?))
}
