//! In-memory scripted remote service.
//!
//! [`StaticRemote`] keeps the whole remote tree in memory with scripted
//! modification times and per-path failure injection, for tests that need
//! precise control over listings without touching the filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mirror_core::remote::{RemoteFile, RemoteFolder, RemoteFileService};
use mirror_core::{Error, Result};
use mirror_fs::normalize_remote_path;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

/// An in-memory [`RemoteFileService`] with failure injection.
#[derive(Debug, Default)]
pub struct StaticRemote {
    files: Mutex<BTreeMap<String, StoredFile>>,
    fail_reads: Mutex<HashSet<String>>,
    fail_listings: Mutex<HashSet<String>>,
}

impl StaticRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file with an explicit modification time.
    pub fn add_file(&self, path: &str, content: &[u8], modified: DateTime<Utc>) {
        self.files.lock().unwrap().insert(
            normalize_remote_path(path),
            StoredFile {
                content: content.to_vec(),
                modified,
            },
        );
    }

    /// Remove a file.
    pub fn remove_file(&self, path: &str) {
        self.files
            .lock()
            .unwrap()
            .remove(&normalize_remote_path(path));
    }

    /// Make subsequent reads of `path` fail.
    pub fn fail_read(&self, path: &str) {
        self.fail_reads
            .lock()
            .unwrap()
            .insert(normalize_remote_path(path));
    }

    /// Make subsequent listings of the folder `path` fail.
    pub fn fail_listing(&self, path: &str) {
        self.fail_listings
            .lock()
            .unwrap()
            .insert(normalize_remote_path(path));
    }

    fn check_listing(&self, key: &str) -> Result<()> {
        if self.fail_listings.lock().unwrap().contains(key) {
            return Err(Error::remote(key, "injected listing failure"));
        }
        Ok(())
    }
}

/// Whether `key` sits directly inside folder `folder`.
fn direct_child(folder: &str, key: &str) -> Option<String> {
    let rest = if folder.is_empty() {
        key
    } else {
        key.strip_prefix(folder)?.strip_prefix('/')?
    };
    if rest.is_empty() { None } else { Some(rest.to_string()) }
}

#[async_trait]
impl RemoteFileService for StaticRemote {
    async fn list_files(&self, remote_path: &str) -> Result<Vec<RemoteFile>> {
        let folder = normalize_remote_path(remote_path);
        self.check_listing(&folder)?;

        let files = self.files.lock().unwrap();
        let mut out = Vec::new();
        for (key, stored) in files.iter() {
            let Some(rest) = direct_child(&folder, key) else {
                continue;
            };
            if rest.contains('/') {
                continue;
            }
            out.push(RemoteFile {
                file_path: key.clone(),
                object_name: rest,
                modified: stored.modified,
                size: stored.content.len() as u64,
            });
        }
        Ok(out)
    }

    async fn list_folders(&self, remote_path: &str) -> Result<Vec<RemoteFolder>> {
        let folder = normalize_remote_path(remote_path);
        self.check_listing(&folder)?;

        let files = self.files.lock().unwrap();
        let mut children: BTreeMap<String, (usize, HashSet<String>)> = BTreeMap::new();
        for key in files.keys() {
            let Some(rest) = direct_child(&folder, key) else {
                continue;
            };
            let Some((child, below)) = rest.split_once('/') else {
                continue;
            };
            let entry = children.entry(child.to_string()).or_default();
            match below.split_once('/') {
                Some((sub, _)) => {
                    entry.1.insert(sub.to_string());
                }
                None => entry.0 += 1,
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, (file_count, sub_folders))| RemoteFolder {
                path: if folder.is_empty() {
                    name
                } else {
                    format!("{}/{}", folder, name)
                },
                child_file_count: file_count,
                child_folder_count: sub_folders.len(),
            })
            .collect())
    }

    async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>> {
        let key = normalize_remote_path(remote_path);
        if self.fail_reads.lock().unwrap().contains(&key) {
            return Err(Error::remote(&key, "injected read failure"));
        }
        self.files
            .lock()
            .unwrap()
            .get(&key)
            .map(|f| f.content.clone())
            .ok_or_else(|| Error::remote(&key, "file not found"))
    }

    async fn save_file(&self, remote_path: &str, content: &[u8]) -> Result<()> {
        self.add_file(remote_path, content, Utc::now());
        Ok(())
    }

    async fn delete_file(&self, remote_path: &str) -> Result<()> {
        let key = normalize_remote_path(remote_path);
        self.files
            .lock()
            .unwrap()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| Error::remote(&key, "file not found"))
    }
}
