//! On-disk cache for remote fetch responses

use kiln_core::{ContentHash, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Responses stored at `<root>/<shard>/<sha256 of path>.<json|bin>`
#[derive(Debug, Clone)]
pub struct FetchCache {
    root: PathBuf,
}

impl FetchCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A cached JSON response for `object_path`, if one parses
    pub fn get_json(&self, object_path: &str) -> Option<serde_json::Value> {
        let file = self.entry(object_path, "json");
        let content = fs::read(&file).ok()?;
        match serde_json::from_slice(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    pub fn put_json(&self, object_path: &str, value: &serde_json::Value) -> Result<PathBuf> {
        let bytes = serde_json::to_vec(value)?;
        self.write(object_path, "json", &bytes)
    }

    pub fn put_binary(&self, object_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.write(object_path, "bin", bytes)
    }

    pub fn contains(&self, object_path: &str) -> bool {
        self.entry(object_path, "json").exists() || self.entry(object_path, "bin").exists()
    }

    fn write(&self, object_path: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        let file = self.entry(object_path, ext);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, bytes)?;
        Ok(file)
    }

    fn entry(&self, object_path: &str, ext: &str) -> PathBuf {
        let hash = ContentHash::of_str(object_path);
        self.root.join(hash.shard()).join(hash.file_name(ext))
    }
}
