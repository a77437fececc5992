//! Error types for mirror-core

use std::path::PathBuf;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No ancestor directory carries the mapping sentinel
    #[error("No project found containing {path}")]
    ProjectNotFound { path: PathBuf },

    /// Mapping document expected but absent
    #[error("Mapping document not found under {path}")]
    MappingNotFound { path: PathBuf },

    /// Remote service call failed
    #[error("Remote service error for {path}: {message}")]
    Remote { path: String, message: String },

    /// Destructive sync blocked by outstanding local changes
    #[error("{outstanding} outstanding local change(s); refusing destructive sync")]
    DirtyWorkingTree { outstanding: usize },

    /// A bulk transfer is already running in this process
    #[error("Another bulk transfer is already in progress")]
    TransferInProgress,

    /// Operation cancelled through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// A spawned transfer task failed outside its own error path
    #[error("Background task failed: {0}")]
    Task(String),

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Fs(#[from] mirror_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn remote(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            path: path.into(),
            message: message.into(),
        }
    }
}
