//! Sync execution: full resync and incremental patching.

use super::report::SyncReport;
use crate::cancel::CancelToken;
use crate::changes::{ChangeDetector, ChangeStatus, FileChange, ProjectChanges};
use crate::diff::{RemoteDiff, in_metadata_subtree};
use crate::mapping::{BackupArea, LegacyMappingDoc, MappingConfig, MappingStore, PathMapping};
use crate::registry::ProjectRegistry;
use crate::remote::{DEFAULT_MAX_IN_FLIGHT, RemoteFileService, list_tree};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use mirror_fs::{checksum, ignore, is_under_remote_root, normalize_remote_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Options for destructive sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Proceed with a full resync even when local changes are outstanding.
    pub allow_dirty: bool,
}

/// Applies reconciliation plans against a project's working tree.
pub struct SyncExecutor {
    service: Arc<dyn RemoteFileService>,
    limiter: Arc<Semaphore>,
}

impl SyncExecutor {
    pub fn new(service: Arc<dyn RemoteFileService>) -> Self {
        Self::with_limit(service, DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_limit(service: Arc<dyn RemoteFileService>, max_in_flight: usize) -> Self {
        Self {
            service,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// First bulk download of a remote subtree, creating a new project.
    ///
    /// Downloads into a temporary sibling directory and moves it into
    /// place only on success, so a failed download leaves nothing behind.
    pub async fn download_project(
        &self,
        root_local: &Path,
        remote_root: &str,
        registry: &ProjectRegistry,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        if root_local.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", root_local.display()),
            )));
        }
        let _guard = registry.bulk_lock().try_acquire()?;

        let temp = temp_sibling(root_local, "download");
        match download_tree(
            &self.service,
            &self.limiter,
            &temp,
            root_local,
            remote_root,
            cancel,
        )
        .await
        {
            Ok(report) => {
                if let Some(parent) = root_local.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&temp, root_local)?;
                registry.invalidate(root_local);
                info!(project = %root_local.display(), "{}", report.summary());
                Ok(report)
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&temp);
                Err(e)
            }
        }
    }

    /// Replace the entire working tree with a fresh copy of the remote.
    ///
    /// Refuses to run while local changes are outstanding unless
    /// explicitly overridden. The download lands in a temporary sibling
    /// directory; only on success is the project directory removed and the
    /// temp directory moved into place. Any failure during download
    /// removes the temp directory and leaves the working tree untouched.
    pub async fn full_resync(
        &self,
        root_local: &Path,
        registry: &ProjectRegistry,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        let config = MappingStore::load(root_local)?.ok_or_else(|| Error::MappingNotFound {
            path: root_local.to_path_buf(),
        })?;

        // Read-only precondition: must not touch the tree it may replace
        let mut detector = ChangeDetector::open(root_local)?;
        let outstanding = detector.evaluate()?;
        if outstanding > 0 && !options.allow_dirty {
            return Err(Error::DirtyWorkingTree { outstanding });
        }

        let _guard = registry.bulk_lock().try_acquire()?;

        let temp = temp_sibling(root_local, "resync");
        match download_tree(
            &self.service,
            &self.limiter,
            &temp,
            root_local,
            &config.root_remote_path,
            cancel,
        )
        .await
        {
            Ok(report) => {
                std::fs::remove_dir_all(root_local)?;
                std::fs::rename(&temp, root_local)?;
                registry.invalidate(root_local);
                info!(project = %root_local.display(), "full resync: {}", report.summary());
                Ok(report)
            }
            Err(e) => {
                let _ = std::fs::remove_dir_all(&temp);
                Err(e)
            }
        }
    }

    /// Apply an incremental reconciliation plan.
    ///
    /// Fetches `new ∪ modified`, removes `removed`, and resets mapping
    /// baselines for every touched file. Per-file failures are logged and
    /// skipped; the batch continues.
    pub async fn incremental_sync(
        &self,
        root_local: &Path,
        diff: &RemoteDiff,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        let mut config = MappingStore::load(root_local)?.ok_or_else(|| Error::MappingNotFound {
            path: root_local.to_path_buf(),
        })?;
        let root_key = normalize_remote_path(&config.root_remote_path);
        let root_remote = config.root_remote_path.trim_end_matches('/').to_string();

        let mut report = SyncReport::default();
        let mut legacy_updated: Vec<(String, String)> = Vec::new();
        let mut legacy_removed: Vec<String> = Vec::new();

        // Fetches, bounded and cancellation-aware.
        let mut set: JoinSet<(String, String, Result<PathMapping>)> = JoinSet::new();
        for key in diff.new_remote.iter().chain(&diff.modified_remote) {
            if cancel.is_cancelled() {
                report.skipped.push(key.clone());
                continue;
            }
            let (rel, remote_path) = match config.find_by_remote(key) {
                Some(entry) => (entry.local_path.clone(), entry.remote_path.clone()),
                None => match relative_under_root(key, &root_key) {
                    Some(rel) => {
                        let remote_path = format!("{}/{}", root_remote, rel);
                        (rel, remote_path)
                    }
                    None => {
                        report.skipped.push(key.clone());
                        continue;
                    }
                },
            };
            let server_modified = diff.remote_meta.get(key).map(|m| m.modified);

            let permit = self
                .limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Task("concurrency limiter closed".into()))?;
            let service = Arc::clone(&self.service);
            let key = key.clone();
            let root = root_local.to_path_buf();
            set.spawn(async move {
                let _permit = permit;
                let outcome =
                    fetch_one(&*service, &root, &key, &rel, &remote_path, server_modified).await;
                (key, rel, outcome)
            });
        }
        while let Some(joined) = set.join_next().await {
            let (key, rel, outcome) = joined.map_err(|e| Error::Task(e.to_string()))?;
            match outcome {
                Ok(entry) => {
                    legacy_updated.push((entry.local_path.clone(), entry.remote_path.clone()));
                    config.upsert(entry);
                    report.fetched.push(rel);
                }
                Err(e) => {
                    warn!(path = %key, error = %e, "fetch failed; skipping file");
                    report.record_failure(&rel, e);
                }
            }
        }

        // Removals: delete the local file if present, drop the entry.
        for key in &diff.removed_remote {
            if cancel.is_cancelled() {
                report.skipped.push(key.clone());
                continue;
            }
            let Some(entry) = config.find_by_remote(key) else {
                report.skipped.push(key.clone());
                continue;
            };
            let rel = entry.local_path.clone();
            let abs = root_local.join(&rel);
            if abs.is_file()
                && let Err(e) = std::fs::remove_file(&abs)
            {
                warn!(path = %rel, error = %e, "failed to remove local file");
                report.record_failure(&rel, e);
                continue;
            }
            config.remove(&rel);
            legacy_removed.push(rel.clone());
            report.removed.push(rel);
        }

        MappingStore::save(root_local, &config)?;

        // Synced files are no longer outstanding local changes.
        if let Some(mut changes) = ProjectChanges::load(root_local)? {
            for rel in report.fetched.iter().chain(&report.removed) {
                changes.remove(rel);
            }
            changes.save(root_local)?;
        }

        LegacyMappingDoc::patch(root_local, &legacy_updated, &legacy_removed)?;

        info!(project = %root_local.display(), "incremental sync: {}", report.summary());
        Ok(report)
    }

    /// Upload outstanding local changes to the remote.
    ///
    /// Modified and added files are written to their resolved remote
    /// paths; locally deleted files are deleted on the remote and
    /// unmapped. Files are transferred one at a time so mapping upserts
    /// stay serialized; per-file failures are logged and skipped.
    pub async fn push_changes(
        &self,
        root_local: &Path,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        let mut config = MappingStore::load(root_local)?.ok_or_else(|| Error::MappingNotFound {
            path: root_local.to_path_buf(),
        })?;
        let root_remote = config.root_remote_path.trim_end_matches('/').to_string();

        let mut detector = ChangeDetector::open(root_local)?;
        detector.scan()?;
        let mut changes: Vec<FileChange> =
            detector.changes().files.values().cloned().collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        let backup = BackupArea::new(root_local);
        let mut report = SyncReport::default();
        let mut legacy_updated: Vec<(String, String)> = Vec::new();
        let mut legacy_removed: Vec<String> = Vec::new();

        for change in changes {
            if cancel.is_cancelled() {
                report.skipped.push(change.path);
                continue;
            }
            let rel = change.path.clone();
            let remote_path = config
                .find(&rel)
                .map(|m| m.remote_path.clone())
                .unwrap_or_else(|| format!("{}/{}", root_remote, rel));
            let key = normalize_remote_path(&remote_path);

            match change.status {
                ChangeStatus::Deleted => match self.service.delete_file(&key).await {
                    Ok(()) => {
                        config.remove(&rel);
                        legacy_removed.push(rel.clone());
                        detector.mark_synced(&rel);
                        report.removed.push(rel);
                    }
                    Err(e) => {
                        warn!(path = %rel, error = %e, "remote delete failed; skipping file");
                        report.record_failure(&rel, e);
                    }
                },
                ChangeStatus::Modified | ChangeStatus::Added => {
                    let abs = root_local.join(&rel);
                    let bytes = match std::fs::read(&abs) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(path = %rel, error = %e, "unreadable local file; skipping");
                            report.record_failure(&rel, e);
                            continue;
                        }
                    };
                    match self.service.save_file(&key, &bytes).await {
                        Ok(()) => {
                            backup.store(&rel, &bytes)?;
                            let is_binary = ignore::is_binary_path(&rel);
                            let content_hash = if is_binary {
                                checksum::compute_file_proxy_checksum(&abs).ok()
                            } else {
                                Some(checksum::compute_checksum(&bytes))
                            };
                            let now = Utc::now();
                            let previous = config.find(&rel);
                            let entry = PathMapping {
                                local_path: rel.clone(),
                                remote_path: remote_path.clone(),
                                last_updated: now,
                                content_hash,
                                // The upload instant approximates the new
                                // remote mtime; a later listing settles it
                                server_modified: Some(now),
                                local_modified_at_download: previous
                                    .and_then(|m| m.local_modified_at_download),
                                is_binary,
                            };
                            config.upsert(entry);
                            legacy_updated.push((rel.clone(), remote_path.clone()));
                            detector.mark_synced(&rel);
                            report.pushed.push(rel);
                        }
                        Err(e) => {
                            warn!(path = %rel, error = %e, "remote save failed; skipping file");
                            report.record_failure(&rel, e);
                        }
                    }
                }
            }
        }

        MappingStore::save(root_local, &config)?;
        detector.persist()?;
        LegacyMappingDoc::patch(root_local, &legacy_updated, &legacy_removed)?;

        info!(project = %root_local.display(), "push: {}", report.summary());
        Ok(report)
    }
}

/// Download the entire subtree under `remote_root` into `dest`, writing a
/// fresh mapping document inside it. Fail-fast: the first failed file
/// aborts the whole download.
///
/// `document_root` is the local root recorded in the mapping document —
/// the project's final location when `dest` is a staging directory about
/// to be swapped into place.
pub(crate) async fn download_tree(
    service: &Arc<dyn RemoteFileService>,
    limiter: &Arc<Semaphore>,
    dest: &Path,
    document_root: &Path,
    remote_root: &str,
    cancel: &CancelToken,
) -> Result<SyncReport> {
    let listing = list_tree(service, remote_root, limiter, cancel).await?;
    if !listing.is_complete() {
        // A partial listing would silently drop whole branches from the
        // staged tree; all-or-nothing callers must not swap that in
        return Err(Error::remote(
            remote_root,
            format!(
                "listing failed for {} subtree(s)",
                listing.failed_subtrees.len()
            ),
        ));
    }
    let root_key = normalize_remote_path(remote_root);
    std::fs::create_dir_all(dest)?;

    let mut set: JoinSet<Result<(String, PathMapping)>> = JoinSet::new();
    for file in listing.files {
        let key = normalize_remote_path(&file.file_path);
        if !is_under_remote_root(&key, &root_key) || in_metadata_subtree(&key) {
            continue;
        }
        let Some(rel) = relative_under_root(&key, &root_key) else {
            continue;
        };
        cancel.check()?;

        let permit = limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Task("concurrency limiter closed".into()))?;
        let service = Arc::clone(service);
        let dest = dest.to_path_buf();
        set.spawn(async move {
            let _permit = permit;
            fetch_one(
                &*service,
                &dest,
                &key,
                &rel,
                &file.file_path,
                Some(file.modified),
            )
            .await
            .map(|entry| (rel, entry))
        });
    }

    let mut report = SyncReport::default();
    let mut entries = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined.map_err(|e| Error::Task(e.to_string()))? {
            Ok((rel, entry)) => {
                entries.push(entry);
                report.fetched.push(rel);
            }
            Err(e) => {
                set.abort_all();
                return Err(e);
            }
        }
    }

    entries.sort_by(|a, b| a.local_path.cmp(&b.local_path));
    report.fetched.sort();
    let config = MappingConfig::new(
        mirror_fs::NormalizedPath::new(document_root).as_str(),
        remote_root,
        entries,
    );
    MappingStore::save(dest, &config)?;
    Ok(report)
}

/// Fetch one remote file, write it locally, and build its mapping entry
/// with fresh baselines. A transfer either completes or fails whole.
async fn fetch_one(
    service: &dyn RemoteFileService,
    root_local: &Path,
    key: &str,
    rel: &str,
    remote_path: &str,
    server_modified: Option<DateTime<Utc>>,
) -> Result<PathMapping> {
    let bytes = service.read_file(key).await?;
    let abs = root_local.join(rel);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&abs, &bytes)?;

    let is_binary = ignore::is_binary_path(rel);
    let content_hash = if is_binary {
        checksum::compute_file_proxy_checksum(&abs).ok()
    } else {
        Some(checksum::compute_checksum(&bytes))
    };

    let now = Utc::now();
    debug!(path = rel, bytes = bytes.len(), "fetched");
    Ok(PathMapping {
        local_path: rel.to_string(),
        remote_path: remote_path.to_string(),
        last_updated: now,
        content_hash,
        server_modified,
        local_modified_at_download: Some(now),
        is_binary,
    })
}

/// Relative path of a normalized key under a normalized root key.
fn relative_under_root(key: &str, root_key: &str) -> Option<String> {
    if root_key.is_empty() {
        return Some(key.to_string());
    }
    key.strip_prefix(root_key)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rel| rel.to_string())
}

/// Temporary sibling directory for staged downloads; never inside the
/// working tree.
pub(crate) fn temp_sibling(root: &Path, tag: &str) -> PathBuf {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let parent = root.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{}.{}-{}.tmp", name, tag, std::process::id()))
}
