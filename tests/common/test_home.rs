use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory holding a `VERSYNC_HOME` and a metadata tree.
/// Everything is removed when the value is dropped.
pub struct TestHome {
    temp: TempDir,
}

#[allow(dead_code)]
impl TestHome {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create test home directory");
        fs::create_dir_all(temp.path().join(".versync/repositories"))
            .expect("Failed to create repositories directory");
        fs::create_dir_all(temp.path().join("metadata"))
            .expect("Failed to create metadata directory");
        Self { temp }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn versync_home(&self) -> PathBuf {
        self.path().join(".versync")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.versync_home().join("cache")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.path().join("metadata")
    }

    pub fn write_repositories(&self, file_name: &str, yaml: &str) -> &Self {
        let path = self.versync_home().join("repositories").join(file_name);
        fs::write(&path, yaml).expect("Failed to write repository definitions");
        self
    }

    pub fn write_config(&self, toml: &str) -> &Self {
        fs::write(self.versync_home().join("config.toml"), toml)
            .expect("Failed to write config.toml");
        self
    }

    /// Write a document below the metadata directory, creating parents.
    pub fn write_document(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.metadata_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create document directory");
        }
        fs::write(&path, text).expect("Failed to write document");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_and_cleans_up_directory() {
        let home_path = {
            let home = TestHome::new();
            assert!(home.versync_home().join("repositories").exists());
            assert!(home.metadata_dir().exists());
            home.path().to_path_buf()
        };
        assert!(!home_path.exists());
    }
}
