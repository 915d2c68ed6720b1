//! Export files on local disk

use kiln_core::Result;
use kiln_export::{ExportTable, Mount, SourceLocator};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Export files laid out below one directory, mapped to package paths by mounts
#[derive(Debug, Clone)]
pub struct LocalExportSource {
    export_directory: PathBuf,
    mounts: Vec<Mount>,
}

impl LocalExportSource {
    pub fn new<P: AsRef<Path>>(export_directory: P, mounts: Vec<Mount>) -> Self {
        Self {
            export_directory: export_directory.as_ref().to_path_buf(),
            mounts,
        }
    }

    pub fn export_directory(&self) -> &Path {
        &self.export_directory
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// The existing export file for a package path, if any mount maps it
    pub fn locate(&self, package_path: &str) -> Option<PathBuf> {
        self.mounts
            .iter()
            .filter_map(|m| m.package_to_file(package_path))
            .map(|relative| self.export_directory.join(relative))
            .find(|file| file.is_file())
    }

    /// Read a package's export file, wrapped in the `data` envelope
    pub fn read(&self, package_path: &str) -> Result<Option<(SourceLocator, Value)>> {
        let Some(file) = self.locate(package_path) else {
            return Ok(None);
        };
        let json = read_export_file(&file)?;
        let locator = SourceLocator {
            package_path: package_path.to_string(),
            file: Some(file),
        };
        Ok(Some((locator, json)))
    }

    /// Locator for an arbitrary export file
    pub fn locator_for(&self, file: &Path) -> SourceLocator {
        SourceLocator::from_file(file, &self.mounts)
    }
}

/// Read an export file. A bare export array is wrapped in the `data` envelope.
pub fn read_export_file(file: &Path) -> Result<Value> {
    let content = fs::read_to_string(file)?;
    let json: Value = serde_json::from_str(&content)?;
    Ok(match json {
        Value::Array(_) => ExportTable::envelope(json),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln_source_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_read_mounted_package() {
        let dir = temp_dir();
        let file_dir = dir.join("MyGame/Content/Textures");
        fs::create_dir_all(&file_dir).unwrap();
        fs::write(
            file_dir.join("T_Rock.json"),
            json!([{ "Type": "Texture2D", "Name": "T_Rock" }]).to_string(),
        )
        .unwrap();

        let source = LocalExportSource::new(&dir, vec![Mount::new("/Game/", "MyGame/Content/")]);
        let (locator, json) = source.read("/Game/Textures/T_Rock").unwrap().unwrap();

        assert_eq!(locator.package_path, "/Game/Textures/T_Rock");
        assert_eq!(json["data"][0]["Name"], "T_Rock");
        assert!(source.read("/Game/Textures/T_Missing").unwrap().is_none());
        assert!(source.read("/Engine/Textures/T_Rock").unwrap().is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_envelope_files_are_kept_as_is() {
        let dir = temp_dir();
        let file = dir.join("M.json");
        fs::write(&file, json!({ "data": [] }).to_string()).unwrap();

        assert_eq!(read_export_file(&file).unwrap(), json!({ "data": [] }));

        fs::remove_dir_all(&dir).ok();
    }
}
