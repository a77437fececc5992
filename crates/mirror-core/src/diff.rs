//! Remote diff collection.
//!
//! Compares a remote listing against the mapping store and produces three
//! disjoint sets over (listing ∪ mapping): new on the remote, modified on
//! the remote, and removed from the remote. The comparison itself is a
//! pure function over the fetched listing; only the fetch is asynchronous.

use crate::cancel::CancelToken;
use crate::mapping::MappingConfig;
use crate::remote::{DEFAULT_MAX_IN_FLIGHT, RemoteFileService, RemoteListing, list_tree};
use crate::Result;
use chrono::{DateTime, Utc};
use mirror_fs::{is_under_remote_root, normalize_remote_path};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Clock-skew tolerance for remote modification timestamps.
pub const MODIFIED_TOLERANCE_MS: i64 = 2000;

/// Remote metadata kept per path for display and decisions downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteMeta {
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// The reconciliation plan produced by the collector.
///
/// The three path sets are mutually exclusive by membership; every path is
/// a normalized remote path.
#[derive(Debug, Clone, Default)]
pub struct RemoteDiff {
    pub new_remote: Vec<String>,
    pub modified_remote: Vec<String>,
    pub removed_remote: Vec<String>,
    pub remote_meta: HashMap<String, RemoteMeta>,
}

impl RemoteDiff {
    /// Whether the plan contains no work.
    pub fn is_empty(&self) -> bool {
        self.new_remote.is_empty()
            && self.modified_remote.is_empty()
            && self.removed_remote.is_empty()
    }
}

/// Fetches remote listings and diffs them against the mapping store.
pub struct RemoteDiffCollector {
    service: Arc<dyn RemoteFileService>,
    limiter: Arc<Semaphore>,
}

impl RemoteDiffCollector {
    pub fn new(service: Arc<dyn RemoteFileService>) -> Self {
        Self::with_limit(service, DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_limit(service: Arc<dyn RemoteFileService>, max_in_flight: usize) -> Self {
        Self {
            service,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Fetch the listing rooted at `remote_root` and partition it against
    /// the config. Stale mapping entries (gone on both sides) are dropped
    /// from `config` as a side effect; the caller persists the config.
    pub async fn collect(
        &self,
        remote_root: &str,
        config: &mut MappingConfig,
        cancel: &CancelToken,
    ) -> Result<RemoteDiff> {
        let listing = list_tree(&self.service, remote_root, &self.limiter, cancel).await?;
        Ok(partition(remote_root, config, &listing))
    }
}

/// Partition a remote listing against the mapping store.
///
/// Mapping entries whose remote path was never seen in the listing are
/// reported as removed only while their local file still exists; otherwise
/// they are silently garbage-collected from `config`. Entries under a
/// subtree whose listing failed contribute nothing in either direction.
/// Remote entries older than their baseline are logged but deliberately
/// not flagged, so server rollbacks do not surface as conflicts.
pub fn partition(
    remote_root: &str,
    config: &mut MappingConfig,
    listing: &RemoteListing,
) -> RemoteDiff {
    let root_key = normalize_remote_path(remote_root);

    // Unique remote files under the root, metadata subtree excluded.
    // Service listings may repeat entries; the first occurrence wins.
    let mut remote_keys: Vec<String> = Vec::new();
    let mut remote_meta: HashMap<String, RemoteMeta> = HashMap::new();
    for file in &listing.files {
        let key = normalize_remote_path(&file.file_path);
        if !is_under_remote_root(&key, &root_key) {
            continue;
        }
        if in_metadata_subtree(&key) {
            continue;
        }
        if remote_meta.contains_key(&key) {
            continue;
        }
        remote_meta.insert(
            key.clone(),
            RemoteMeta {
                modified: file.modified,
                size: file.size,
            },
        );
        remote_keys.push(key);
    }

    // Mapped entries under the same root, keyed by normalized remote path.
    let mut mapped: Vec<(String, String, Option<DateTime<Utc>>)> = Vec::new();
    let mut mapped_keys: HashMap<String, usize> = HashMap::new();
    for entry in &config.mappings {
        let key = normalize_remote_path(&entry.remote_path);
        if !is_under_remote_root(&key, &root_key) {
            continue;
        }
        if mapped_keys.contains_key(&key) {
            continue;
        }
        mapped_keys.insert(key.clone(), mapped.len());
        mapped.push((key, entry.local_path.clone(), entry.baseline()));
    }

    let mut diff = RemoteDiff::default();

    for key in &remote_keys {
        match mapped_keys.get(key) {
            None => diff.new_remote.push(key.clone()),
            Some(&idx) => {
                let (_, _, baseline) = &mapped[idx];
                let meta = &remote_meta[key];
                match baseline {
                    None => {
                        debug!(path = %key, "no baseline on record; cannot classify remote change");
                    }
                    Some(baseline) => {
                        let delta_ms = (meta.modified - *baseline).num_milliseconds();
                        if delta_ms > MODIFIED_TOLERANCE_MS {
                            diff.modified_remote.push(key.clone());
                        } else if delta_ms < -MODIFIED_TOLERANCE_MS {
                            debug!(path = %key, delta_ms, "remote older than baseline; not flagged");
                        }
                    }
                }
            }
        }
    }

    // Mapped entries never seen in the listing: removed on the remote, or
    // stale on both sides (garbage-collected, not reported). A dead
    // listing branch proves nothing about its files.
    let mut stale: Vec<String> = Vec::new();
    for (key, local_path, _) in &mapped {
        if remote_meta.contains_key(key) {
            continue;
        }
        if under_failed_subtree(key, &listing.failed_subtrees) {
            debug!(path = %key, "subtree listing failed; leaving entry untouched");
            continue;
        }
        let local_abs = Path::new(&config.root_local_path).join(local_path);
        if local_abs.is_file() {
            diff.removed_remote.push(key.clone());
        } else {
            stale.push(local_path.clone());
        }
    }
    for local_path in stale {
        debug!(path = %local_path, "dropping stale mapping entry");
        config.remove(&local_path);
    }

    diff.remote_meta = remote_meta;
    diff
}

pub(crate) fn in_metadata_subtree(key: &str) -> bool {
    key.split('/').any(|component| component == ".mirror")
}

fn under_failed_subtree(key: &str, failed: &[String]) -> bool {
    failed
        .iter()
        .any(|prefix| key == prefix || is_under_remote_root(key, prefix))
}
