//! Remote File Service collaborator interface.
//!
//! The core never talks to a wire protocol directly; it depends on this
//! trait only. Paths handed to the service are normalized remote paths
//! (forward slashes, no repeated or leading separators). Every call may
//! fail or time out; callers treat listing failures as best-effort partial
//! results and transfer failures per the batch discipline of the caller.

mod dir;

pub use dir::DirRemote;

use crate::cancel::CancelToken;
use crate::{Error, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Default cap on simultaneously in-flight remote calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Window within which transient remote failures are retried.
const RETRY_WINDOW: Duration = Duration::from_secs(5);

/// Metadata for one remote file, as returned by a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Full remote path of the file
    pub file_path: String,
    /// Object name (base name) of the file on the service
    pub object_name: String,
    /// Remote modification time
    pub modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

/// Metadata for one remote folder.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFolder {
    /// Full remote path of the folder
    pub path: String,
    /// Number of files directly inside
    pub child_file_count: usize,
    /// Number of folders directly inside
    pub child_folder_count: usize,
}

/// The remote collaborator the core synchronizes against.
#[async_trait]
pub trait RemoteFileService: Send + Sync {
    /// List the files directly inside `remote_path`.
    async fn list_files(&self, remote_path: &str) -> Result<Vec<RemoteFile>>;

    /// List the folders directly inside `remote_path`.
    async fn list_folders(&self, remote_path: &str) -> Result<Vec<RemoteFolder>>;

    /// Read the full content of a remote file.
    async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>>;

    /// Write the full content of a remote file.
    async fn save_file(&self, remote_path: &str, content: &[u8]) -> Result<()>;

    /// Delete a remote file.
    async fn delete_file(&self, remote_path: &str) -> Result<()>;
}

/// Retry a remote call with exponential backoff over a bounded window.
pub(crate) async fn retry_remote<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_elapsed_time(Some(RETRY_WINDOW))
        .build();
    backoff::future::retry(policy, move || {
        let fut = op();
        async move { fut.await.map_err(backoff::Error::transient) }
    })
    .await
}

/// A recursive listing with the subtrees that could not be walked.
///
/// Failed subtrees contribute nothing to a diff: the collector must not
/// interpret their absence from `files` as remote-side deletions.
#[derive(Debug, Clone, Default)]
pub struct RemoteListing {
    pub files: Vec<RemoteFile>,
    /// Normalized folder keys whose listing failed after retries
    pub failed_subtrees: Vec<String>,
}

impl RemoteListing {
    pub fn new(files: Vec<RemoteFile>) -> Self {
        Self {
            files,
            failed_subtrees: Vec::new(),
        }
    }

    /// Whether every subtree listed cleanly.
    pub fn is_complete(&self) -> bool {
        self.failed_subtrees.is_empty()
    }
}

/// Recursively list every file under `root`.
///
/// Folders are walked breadth-first with bounded concurrency. A subtree
/// whose listing fails (after retries) is logged, recorded in
/// `failed_subtrees`, and not descended into; the rest of the walk
/// continues. Cancellation is polled before each folder is scheduled.
pub async fn list_tree(
    service: &Arc<dyn RemoteFileService>,
    root: &str,
    limiter: &Arc<Semaphore>,
    cancel: &CancelToken,
) -> Result<RemoteListing> {
    let mut listing = RemoteListing::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier = vec![mirror_fs::normalize_remote_path(root)];

    while !frontier.is_empty() {
        let mut set: JoinSet<(String, Option<(Vec<RemoteFile>, Vec<RemoteFolder>)>)> =
            JoinSet::new();

        for folder in frontier.drain(..) {
            if !visited.insert(folder.clone()) {
                continue;
            }
            cancel.check()?;

            let service = Arc::clone(service);
            let limiter = Arc::clone(limiter);
            set.spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (folder, None),
                };
                let listed_files =
                    retry_remote(|| service.list_files(&folder)).await;
                let listed_folders =
                    retry_remote(|| service.list_folders(&folder)).await;
                match (listed_files, listed_folders) {
                    (Ok(f), Ok(d)) => (folder, Some((f, d))),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(folder = %folder, error = %e, "remote listing failed; skipping subtree");
                        (folder, None)
                    }
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            let (folder, listed) = joined.map_err(|e| Error::Task(e.to_string()))?;
            match listed {
                Some((listed_files, listed_folders)) => {
                    listing.files.extend(listed_files);
                    frontier.extend(
                        listed_folders
                            .into_iter()
                            .map(|f| mirror_fs::normalize_remote_path(&f.path)),
                    );
                }
                None => listing.failed_subtrees.push(folder),
            }
        }
    }

    Ok(listing)
}
