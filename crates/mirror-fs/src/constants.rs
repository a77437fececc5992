//! Constants for the project metadata layout.

use std::path::Path;

/// Standard metadata markers and file names under a project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorPath {
    /// The `.mirror` directory (project metadata root)
    MetaDir,
    /// The mapping document inside the metadata directory.
    ///
    /// Its presence defines the project root: a directory is a project iff
    /// `.mirror/mapping.json` exists.
    MappingFile,
    /// The change-state document inside the metadata directory
    ChangesFile,
    /// The backup area inside the metadata directory
    BackupsDir,
    /// The legacy flat mapping document at the project root
    LegacyMappingFile,
}

impl MirrorPath {
    /// Get the string representation of the path component.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetaDir => ".mirror",
            Self::MappingFile => "mapping.json",
            Self::ChangesFile => "changes.json",
            Self::BackupsDir => "backups",
            Self::LegacyMappingFile => "mappings.json",
        }
    }
}

impl AsRef<Path> for MirrorPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for MirrorPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MirrorPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
