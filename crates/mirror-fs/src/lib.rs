//! Filesystem layer for remote-mirror
//!
//! Provides normalized path handling, checksum utilities, the scan
//! exclusion policy, and safe atomic I/O for the persisted JSON documents.

pub mod checksum;
pub mod constants;
pub mod document;
pub mod error;
pub mod ignore;
pub mod io;
pub mod path;

pub use constants::MirrorPath;
pub use error::{Error, Result};
pub use path::{NormalizedPath, is_under_remote_root, normalize_remote_path};
