//! Scan exclusion policy.
//!
//! Two independent classifications:
//!
//! - [`is_ignored`]: paths excluded from change tracking entirely
//!   (VCS metadata, dependency directories, OS index files, media and
//!   archive extensions).
//! - [`is_binary_path`]: tracked files whose content is not hashed; they
//!   get a `size + mtime` proxy digest instead.

/// Directory components that are never scanned.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".mirror",
    "node_modules",
    "__pycache__",
    ".venv",
];

/// File names that are never scanned.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Media and archive extensions excluded from scanning entirely.
const IGNORED_EXTENSIONS: &[&str] = &[
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war", "png", "jpg", "jpeg",
    "gif", "bmp", "ico", "svgz", "mp3", "wav", "ogg", "mp4", "avi", "mov", "mkv", "webm",
];

/// Extensions treated as binary for hashing purposes.
const BINARY_EXTENSIONS: &[&str] = &[
    "bin", "dat", "exe", "dll", "so", "dylib", "o", "obj", "a", "lib", "class", "pdf", "doc",
    "docx", "xls", "xlsx", "ppt", "pptx", "sqlite", "db",
];

/// Check whether a relative, forward-slash-normalized path is excluded from
/// scanning.
pub fn is_ignored(rel_path: &str) -> bool {
    for component in rel_path.split('/') {
        if IGNORED_DIRS.contains(&component) {
            return true;
        }
    }
    if let Some(name) = rel_path.rsplit('/').next()
        && IGNORED_FILES.contains(&name)
    {
        return true;
    }
    match extension_of(rel_path) {
        Some(ext) => IGNORED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Check whether a path should be treated as binary (extension-derived).
pub fn is_binary_path(rel_path: &str) -> bool {
    match extension_of(rel_path) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str()) || IGNORED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

fn extension_of(rel_path: &str) -> Option<&str> {
    let name = rel_path.rsplit('/').next()?;
    let idx = name.rfind('.')?;
    if idx == 0 { None } else { Some(&name[idx + 1..]) }
}
