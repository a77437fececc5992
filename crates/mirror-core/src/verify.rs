//! Two-tier integrity verification.
//!
//! Tier 1 downloads the remote subtree into a temporary directory (never
//! swapped into the working tree) and diffs the fresh mapping snapshot
//! against the current store purely by metadata. Tier 2 runs only over the
//! files Tier 1 flagged, comparing the working tree against the files
//! already sitting in the temp directory, so content is never fetched
//! twice. The temp directory is removed once Tier 2 completes, success or
//! failure.

use crate::cancel::CancelToken;
use crate::diff::MODIFIED_TOLERANCE_MS;
use crate::mapping::{MappingConfig, MappingStore};
use crate::remote::{DEFAULT_MAX_IN_FLIGHT, RemoteFileService, list_tree};
use crate::sync::{download_tree, temp_sibling};
use crate::{Error, Result};
use chrono::Utc;
use mirror_fs::{ignore, normalize_remote_path};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Share of entries missing `server_modified` beyond which the mapping is
/// treated as a legacy document.
const LEGACY_RATIO: f64 = 0.8;

/// Overall verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyStatus {
    /// Metadata matched everywhere; content was never compared
    Clean,
    /// One or more files diverged
    Flagged,
    /// Legacy mapping detected; metadata was backfilled and the caller
    /// must re-run verification
    RerunRequired,
}

/// Why Tier 1 flagged an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagReason {
    RemovedFromServer,
    NewOnServer,
    ModifiedOnServer,
    ContentChanged,
}

/// A Tier-1 metadata flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyFlag {
    /// Local relative path
    pub path: String,
    pub reason: FlagReason,
}

/// A Tier-2 content finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentOutcome {
    OnlyInLocal,
    OnlyInServer,
    Different,
}

/// One confirmed divergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyFinding {
    /// Local relative path
    pub path: String,
    pub outcome: ContentOutcome,
}

/// Report from a verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub status: VerifyStatus,
    /// Tier-1 metadata flags
    pub flags: Vec<VerifyFlag>,
    /// Tier-2 confirmed findings (subset of the flagged files)
    pub findings: Vec<VerifyFinding>,
}

impl VerifyReport {
    fn clean() -> Self {
        Self {
            status: VerifyStatus::Clean,
            flags: Vec::new(),
            findings: Vec::new(),
        }
    }

    fn rerun_required() -> Self {
        Self {
            status: VerifyStatus::RerunRequired,
            flags: Vec::new(),
            findings: Vec::new(),
        }
    }
}

/// Whole-project integrity verifier.
pub struct TieredVerifier {
    service: Arc<dyn RemoteFileService>,
    limiter: Arc<Semaphore>,
}

impl TieredVerifier {
    pub fn new(service: Arc<dyn RemoteFileService>) -> Self {
        Self::with_limit(service, DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_limit(service: Arc<dyn RemoteFileService>, max_in_flight: usize) -> Self {
        Self {
            service,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Verify a project's working copy against the remote.
    pub async fn verify(&self, root_local: &Path, cancel: &CancelToken) -> Result<VerifyReport> {
        let mut config = MappingStore::load(root_local)?.ok_or_else(|| Error::MappingNotFound {
            path: root_local.to_path_buf(),
        })?;

        if is_legacy(&config) {
            info!(project = %root_local.display(), "legacy mapping detected; backfilling metadata");
            self.backfill(root_local, &mut config, cancel).await?;
            return Ok(VerifyReport::rerun_required());
        }

        let temp = temp_sibling(root_local, "verify");
        let result = self.run_tiers(root_local, &config, &temp, cancel).await;
        let _ = std::fs::remove_dir_all(&temp);
        result
    }

    async fn run_tiers(
        &self,
        root_local: &Path,
        config: &MappingConfig,
        temp: &Path,
        cancel: &CancelToken,
    ) -> Result<VerifyReport> {
        download_tree(
            &self.service,
            &self.limiter,
            temp,
            temp,
            &config.root_remote_path,
            cancel,
        )
        .await?;
        let snapshot = MappingStore::load(temp)?.ok_or_else(|| Error::MappingNotFound {
            path: temp.to_path_buf(),
        })?;

        let flags = metadata_diff(config, &snapshot);
        if flags.is_empty() {
            // Nothing flagged: content comparison never runs
            return Ok(VerifyReport::clean());
        }

        let findings = content_diff(root_local, temp, &flags);
        Ok(VerifyReport {
            status: VerifyStatus::Flagged,
            flags,
            findings,
        })
    }

    /// Backfill `server_modified` for every entry from a recursive remote
    /// listing.
    async fn backfill(
        &self,
        root_local: &Path,
        config: &mut MappingConfig,
        cancel: &CancelToken,
    ) -> Result<()> {
        let listing = list_tree(
            &self.service,
            &config.root_remote_path,
            &self.limiter,
            cancel,
        )
        .await?;
        let by_key: HashMap<String, chrono::DateTime<Utc>> = listing
            .files
            .iter()
            .map(|f| (normalize_remote_path(&f.file_path), f.modified))
            .collect();

        let mut backfilled = 0usize;
        for entry in &mut config.mappings {
            if entry.server_modified.is_some() {
                continue;
            }
            let key = normalize_remote_path(&entry.remote_path);
            if let Some(modified) = by_key.get(&key) {
                entry.server_modified = Some(*modified);
                entry.last_updated = Utc::now();
                backfilled += 1;
            } else {
                debug!(path = %entry.local_path, "no remote counterpart during backfill");
            }
        }
        MappingStore::save(root_local, config)?;
        info!(backfilled, "metadata backfill complete");
        Ok(())
    }
}

/// Tier 1: in-memory structural diff between the current store and the
/// fresh snapshot, keyed by local path. No byte comparison happens here.
pub fn metadata_diff(current: &MappingConfig, snapshot: &MappingConfig) -> Vec<VerifyFlag> {
    let snap_by_path: HashMap<&str, &crate::mapping::PathMapping> = snapshot
        .mappings
        .iter()
        .map(|m| (m.local_path.as_str(), m))
        .collect();
    let current_by_path: HashMap<&str, &crate::mapping::PathMapping> = current
        .mappings
        .iter()
        .map(|m| (m.local_path.as_str(), m))
        .collect();

    let mut flags = Vec::new();

    for entry in &current.mappings {
        match snap_by_path.get(entry.local_path.as_str()) {
            None => flags.push(VerifyFlag {
                path: entry.local_path.clone(),
                reason: FlagReason::RemovedFromServer,
            }),
            Some(snap) => {
                let modified_drift = match (entry.server_modified, snap.server_modified) {
                    (Some(a), Some(b)) => {
                        (b - a).num_milliseconds().abs() > MODIFIED_TOLERANCE_MS
                    }
                    _ => false,
                };
                if modified_drift {
                    flags.push(VerifyFlag {
                        path: entry.local_path.clone(),
                        reason: FlagReason::ModifiedOnServer,
                    });
                    continue;
                }
                // Proxy digests are derived from local metadata and are not
                // comparable across sides; hash drift only applies to text.
                let hash_drift = !entry.is_binary
                    && !snap.is_binary
                    && match (&entry.content_hash, &snap.content_hash) {
                        (Some(a), Some(b)) => a != b,
                        _ => false,
                    };
                if hash_drift {
                    flags.push(VerifyFlag {
                        path: entry.local_path.clone(),
                        reason: FlagReason::ContentChanged,
                    });
                }
            }
        }
    }

    for entry in &snapshot.mappings {
        if !current_by_path.contains_key(entry.local_path.as_str()) {
            flags.push(VerifyFlag {
                path: entry.local_path.clone(),
                reason: FlagReason::NewOnServer,
            });
        }
    }

    flags
}

/// Tier 2: compare the working tree against the files already fetched into
/// the Tier-1 temp directory. Flagged files whose content actually matches
/// despite metadata drift are dropped silently.
fn content_diff(root_local: &Path, temp: &Path, flags: &[VerifyFlag]) -> Vec<VerifyFinding> {
    let mut findings = Vec::new();

    for flag in flags {
        let local = root_local.join(&flag.path);
        let server = temp.join(&flag.path);

        let outcome = match (local.is_file(), server.is_file()) {
            (true, false) => Some(ContentOutcome::OnlyInLocal),
            (false, true) => Some(ContentOutcome::OnlyInServer),
            (false, false) => None,
            (true, true) => {
                if ignore::is_binary_path(&flag.path) {
                    compare_binary(&local, &server)
                } else {
                    compare_text(&local, &server)
                }
            }
        };

        if let Some(outcome) = outcome {
            findings.push(VerifyFinding {
                path: flag.path.clone(),
                outcome,
            });
        }
    }

    findings
}

/// Binary comparison by size heuristic; content is never read.
fn compare_binary(local: &Path, server: &Path) -> Option<ContentOutcome> {
    let local_len = std::fs::metadata(local).map(|m| m.len());
    let server_len = std::fs::metadata(server).map(|m| m.len());
    match (local_len, server_len) {
        (Ok(a), Ok(b)) if a == b => None,
        (Ok(_), Ok(_)) => Some(ContentOutcome::Different),
        (Err(e), _) | (_, Err(e)) => {
            warn!(path = %local.display(), error = %e, "binary compare failed");
            None
        }
    }
}

/// Text comparison by exact string equality after decoding.
fn compare_text(local: &Path, server: &Path) -> Option<ContentOutcome> {
    let local_bytes = std::fs::read(local);
    let server_bytes = std::fs::read(server);
    match (local_bytes, server_bytes) {
        (Ok(a), Ok(b)) => {
            if String::from_utf8_lossy(&a) == String::from_utf8_lossy(&b) {
                None
            } else {
                Some(ContentOutcome::Different)
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(path = %local.display(), error = %e, "text compare failed");
            None
        }
    }
}

/// More than [`LEGACY_RATIO`] of entries lacking `server_modified` marks an
/// old mapping format.
fn is_legacy(config: &MappingConfig) -> bool {
    if config.mappings.is_empty() {
        return false;
    }
    let missing = config
        .mappings
        .iter()
        .filter(|m| m.server_modified.is_none())
        .count();
    (missing as f64) / (config.mappings.len() as f64) > LEGACY_RATIO
}
