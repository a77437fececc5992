//! [`TestProject`] builder for synchronization test scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory with helper methods for test setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::TestProject;
///
/// let project = TestProject::new();
/// project.write("src/main.rs", "fn main() {}");
/// project.assert_file_exists("src/main.rs");
/// ```
pub struct TestProject {
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Resolve a relative path under the root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp_dir.path().join(rel)
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Read a file's content as a string.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    /// Remove a file.
    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).unwrap();
    }

    /// Assert that a file exists under the root.
    pub fn assert_file_exists(&self, rel: &str) {
        assert!(
            self.path(rel).is_file(),
            "expected file to exist: {}",
            rel
        );
    }

    /// Assert that a path does not exist under the root.
    pub fn assert_missing(&self, rel: &str) {
        assert!(
            !self.path(rel).exists(),
            "expected path to be absent: {}",
            rel
        );
    }
}
