//! Synchronization and change-tracking core for remote-mirror
//!
//! Keeps a local working copy of a remote file tree consistent with that
//! tree, tracks which local files have diverged, and reconciles
//! divergences in either direction without full re-downloads when
//! avoidable:
//!
//! - **Mapping store**: persistent local↔remote path mapping per project
//!   root, with content hashes and baselines
//! - **Change detector**: hash-based scanner/watcher classifying local
//!   files as unchanged, modified, added, or deleted
//! - **Remote diff collector**: partitions a remote listing against the
//!   mapping store into disjoint new/modified/removed sets
//! - **Sync executor**: full resync (atomic replace) and incremental
//!   patching with baseline refresh
//! - **Tiered verifier**: metadata-only pre-check gating content
//!   comparison
//!
//! # Architecture
//!
//! ```text
//!          CLI / editor commands
//!                   |
//!              mirror-core
//!                   |
//!               mirror-fs
//! ```
//!
//! The remote side is reached exclusively through the
//! [`remote::RemoteFileService`] trait.

pub mod cancel;
pub mod changes;
pub mod diff;
pub mod error;
pub mod guard;
pub mod mapping;
pub mod registry;
pub mod remote;
pub mod sync;
pub mod verify;

pub use cancel::CancelToken;
pub use changes::{ChangeDetector, ChangeStatus, ChangeUpdate, ChangeWatcher, FileChange, ProjectChanges};
pub use diff::{MODIFIED_TOLERANCE_MS, RemoteDiff, RemoteDiffCollector, RemoteMeta, partition};
pub use error::{Error, Result};
pub use guard::{BulkTransferGuard, BulkTransferLock};
pub use mapping::{BackupArea, LegacyMappingDoc, MappingConfig, MappingStore, PathMapping};
pub use registry::ProjectRegistry;
pub use remote::{DirRemote, RemoteFile, RemoteFileService, RemoteFolder, RemoteListing};
pub use sync::{SyncExecutor, SyncOptions, SyncReport};
pub use verify::{
    ContentOutcome, FlagReason, TieredVerifier, VerifyFinding, VerifyFlag, VerifyReport,
    VerifyStatus,
};
