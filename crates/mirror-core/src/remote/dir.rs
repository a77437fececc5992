//! Directory-backed remote service.
//!
//! Serves a plain local directory tree through the [`RemoteFileService`]
//! interface. Used by the CLI (mirroring between two directories) and by
//! tests that need a real collaborator without a wire protocol.

use super::{RemoteFile, RemoteFolder, RemoteFileService};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A [`RemoteFileService`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct DirRemote {
    base: PathBuf,
}

impl DirRemote {
    /// Create a service serving the tree under `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve a normalized remote path to a location under the base.
    fn resolve(&self, remote_path: &str) -> PathBuf {
        let key = mirror_fs::normalize_remote_path(remote_path);
        if key.is_empty() {
            self.base.clone()
        } else {
            self.base.join(key)
        }
    }
}

#[async_trait]
impl RemoteFileService for DirRemote {
    async fn list_files(&self, remote_path: &str) -> Result<Vec<RemoteFile>> {
        let dir = self.resolve(remote_path);
        let key = mirror_fs::normalize_remote_path(remote_path);
        let mut files = Vec::new();

        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::remote(remote_path, e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::remote(remote_path, e.to_string()))?;
            let meta = entry
                .metadata()
                .map_err(|e| Error::remote(remote_path, e.to_string()))?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let file_path = if key.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", key, name)
            };
            let modified: DateTime<Utc> = meta
                .modified()
                .map_err(|e| Error::remote(remote_path, e.to_string()))?
                .into();
            files.push(RemoteFile {
                file_path,
                object_name: name,
                modified,
                size: meta.len(),
            });
        }

        Ok(files)
    }

    async fn list_folders(&self, remote_path: &str) -> Result<Vec<RemoteFolder>> {
        let dir = self.resolve(remote_path);
        let key = mirror_fs::normalize_remote_path(remote_path);
        let mut folders = Vec::new();

        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::remote(remote_path, e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::remote(remote_path, e.to_string()))?;
            let meta = entry
                .metadata()
                .map_err(|e| Error::remote(remote_path, e.to_string()))?;
            if !meta.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let path = if key.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", key, name)
            };
            let (child_file_count, child_folder_count) = count_children(&entry.path());
            folders.push(RemoteFolder {
                path,
                child_file_count,
                child_folder_count,
            });
        }

        Ok(folders)
    }

    async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>> {
        std::fs::read(self.resolve(remote_path))
            .map_err(|e| Error::remote(remote_path, e.to_string()))
    }

    async fn save_file(&self, remote_path: &str, content: &[u8]) -> Result<()> {
        let target = self.resolve(remote_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::remote(remote_path, e.to_string()))?;
        }
        std::fs::write(&target, content).map_err(|e| Error::remote(remote_path, e.to_string()))
    }

    async fn delete_file(&self, remote_path: &str) -> Result<()> {
        std::fs::remove_file(self.resolve(remote_path))
            .map_err(|e| Error::remote(remote_path, e.to_string()))
    }
}

fn count_children(dir: &Path) -> (usize, usize) {
    let mut files = 0;
    let mut folders = 0;
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            match entry.metadata() {
                Ok(meta) if meta.is_dir() => folders += 1,
                Ok(meta) if meta.is_file() => files += 1,
                _ => {}
            }
        }
    }
    (files, folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::remote::{DEFAULT_MAX_IN_FLIGHT, list_tree};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    fn seed(base: &Path) {
        std::fs::create_dir_all(base.join("proj/sub")).unwrap();
        std::fs::write(base.join("proj/a.txt"), "alpha").unwrap();
        std::fs::write(base.join("proj/sub/b.txt"), "beta").unwrap();
    }

    #[tokio::test]
    async fn lists_files_and_folders() {
        let temp = TempDir::new().unwrap();
        seed(temp.path());
        let remote = DirRemote::new(temp.path());

        let files = remote.list_files("proj").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_path, "proj/a.txt");
        assert_eq!(files[0].size, 5);

        let folders = remote.list_folders("proj").await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].path, "proj/sub");
        assert_eq!(folders[0].child_file_count, 1);
    }

    #[tokio::test]
    async fn list_tree_walks_recursively() {
        let temp = TempDir::new().unwrap();
        seed(temp.path());
        let remote: Arc<dyn RemoteFileService> = Arc::new(DirRemote::new(temp.path()));
        let limiter = Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT));

        let mut files = list_tree(&remote, "proj", &limiter, &CancelToken::new())
            .await
            .unwrap();
        files.files.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let paths: Vec<_> = files.files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["proj/a.txt", "proj/sub/b.txt"]);
    }

    #[tokio::test]
    async fn list_tree_cancellation_aborts() {
        let temp = TempDir::new().unwrap();
        seed(temp.path());
        let remote: Arc<dyn RemoteFileService> = Arc::new(DirRemote::new(temp.path()));
        let limiter = Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT));
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = list_tree(&remote, "proj", &limiter, &cancel).await;
        assert!(matches!(result, Err(crate::Error::Cancelled)));
    }

    #[tokio::test]
    async fn missing_subtree_is_an_error_for_direct_calls() {
        let temp = TempDir::new().unwrap();
        let remote = DirRemote::new(temp.path());
        assert!(remote.list_files("nope").await.is_err());
        assert!(remote.read_file("nope/file.txt").await.is_err());
    }

    #[tokio::test]
    async fn save_and_delete_roundtrip() {
        let temp = TempDir::new().unwrap();
        let remote = DirRemote::new(temp.path());

        remote.save_file("x/y.txt", b"payload").await.unwrap();
        assert_eq!(remote.read_file("x/y.txt").await.unwrap(), b"payload");

        remote.delete_file("x/y.txt").await.unwrap();
        assert!(remote.read_file("x/y.txt").await.is_err());
    }
}
