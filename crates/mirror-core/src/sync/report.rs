//! Aggregate reporting for sync operations.

use serde::{Deserialize, Serialize};

/// Outcome of a sync operation.
///
/// Batch operations are resilient: per-file failures are collected here
/// rather than aborting the batch. Paths are local relative paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Files fetched from the remote and written locally
    pub fetched: Vec<String>,
    /// Files pushed from the working tree to the remote
    pub pushed: Vec<String>,
    /// Files removed on one side because they disappeared on the other
    pub removed: Vec<String>,
    /// Files skipped (cancellation, missing counterpart)
    pub skipped: Vec<String>,
    /// Per-file failures as `path: reason`
    pub failed: Vec<String>,
}

impl SyncReport {
    /// Whether the batch completed without per-file failures.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Record a per-file failure.
    pub fn record_failure(&mut self, path: &str, reason: impl std::fmt::Display) {
        self.failed.push(format!("{}: {}", path, reason));
    }

    /// One-line aggregate for user-facing output.
    pub fn summary(&self) -> String {
        format!(
            "{} fetched, {} pushed, {} removed, {} skipped, {} failed",
            self.fetched.len(),
            self.pushed.len(),
            self.removed.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}
