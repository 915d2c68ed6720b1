//! Package path normalization and mount mapping

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root-prefix substitution, e.g. `MyGame/Content` -> `/Game`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRedirect {
    pub from: String,
    pub to: String,
}

/// Redirects applied once when a reference descriptor is parsed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRules {
    redirects: Vec<PathRedirect>,
}

impl PathRules {
    pub fn new(redirects: Vec<PathRedirect>) -> Self {
        Self { redirects }
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.push(PathRedirect {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn redirects(&self) -> &[PathRedirect] {
        &self.redirects
    }

    /// Apply the first redirect whose prefix matches. Leading slashes are
    /// ignored on both sides since the extractor omits them.
    pub fn apply(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        for redirect in &self.redirects {
            let from = redirect.from.trim_matches('/');
            if from.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix(from) {
                if rest.is_empty() || rest.starts_with('/') || rest.starts_with('.') {
                    return format!("{}{}", redirect.to.trim_end_matches('/'), rest);
                }
            }
        }
        path.to_string()
    }
}

/// Maps a package root to a directory below the export directory,
/// e.g. `/Game/` <-> `MyGame/Content/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub package_prefix: String,
    pub directory: String,
}

impl Mount {
    pub fn new(package_prefix: &str, directory: &str) -> Self {
        Self {
            package_prefix: package_prefix.to_string(),
            directory: directory.to_string(),
        }
    }

    /// `/Game/Foo/Bar` -> `MyGame/Content/Foo/Bar.json`
    pub fn package_to_file(&self, package_path: &str) -> Option<PathBuf> {
        let prefix = format!("{}/", self.package_prefix.trim_end_matches('/'));
        let rest = package_path.strip_prefix(&prefix)?;
        if rest.is_empty() {
            return None;
        }
        let dir = self.directory.trim_matches('/');
        Some(PathBuf::from(format!("{}/{}.json", dir, rest)))
    }

    /// Inverse of `package_to_file`, searching for the mount directory
    /// anywhere inside `file`
    pub fn file_to_package(&self, file: &Path) -> Option<String> {
        let normalized = file.to_string_lossy().replace('\\', "/");
        let needle = format!("{}/", self.directory.trim_matches('/'));
        let start = normalized.find(&needle)?;
        let rest = &normalized[start + needle.len()..];
        let rest = rest.strip_suffix(".json").unwrap_or(rest);
        Some(format!(
            "{}/{}",
            self.package_prefix.trim_end_matches('/'),
            rest
        ))
    }
}

/// Where a batch came from: its package path and, for local imports, the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocator {
    /// `/Game/Materials/M_Rock`
    pub package_path: String,
    pub file: Option<PathBuf>,
}

impl SourceLocator {
    pub fn new(package_path: &str) -> Self {
        Self {
            package_path: package_path.to_string(),
            file: None,
        }
    }

    /// Derive the package path of an export file from the mount rules.
    /// Unmounted files fall back to `/<file stem>`.
    pub fn from_file(file: &Path, mounts: &[Mount]) -> Self {
        let package_path = mounts
            .iter()
            .find_map(|m| m.file_to_package(file))
            .unwrap_or_else(|| {
                let stem = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!("/{}", stem)
            });
        Self {
            package_path,
            file: Some(file.to_path_buf()),
        }
    }

    /// `Bar` for `/Game/Foo/Bar`
    pub fn asset_name(&self) -> &str {
        self.package_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.package_path)
    }

    /// Content-store path of an export of this package
    pub fn object_path(&self, outer: Option<&str>, name: &str) -> String {
        match outer {
            Some(outer) => format!("{}.{}:{}", self.package_path, outer, name),
            None => format!("{}.{}", self.package_path, name),
        }
    }
}
