//! Containers stored as plain directories.

use std::fs;
use std::path::{Path, PathBuf};

use ember_core::alloc::HashSet;
use ember_core::profiling::profile_function;

use crate::asset::RawAsset;
use crate::error::{AssetError, AssetResult};
use crate::file::AssetFile;
use crate::handle::AssetHandle;
use crate::processor::{AssetProcessor, logical_path};
use crate::storage::AssetStorage;

/// Registers every file below `root/<container>` as a raw asset.
#[derive(Debug, Default)]
pub struct DirectoryProcessor;

impl DirectoryProcessor {
    pub fn new() -> Self {
        Self
    }
}

/// Regular files below `dir`, sorted, as paths relative to `dir`.
fn collect_files(dir: &Path) -> AssetResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![PathBuf::new()];
    while let Some(relative) = stack.pop() {
        let current = dir.join(&relative);
        let entries = fs::read_dir(&current).map_err(|source| AssetError::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry?;
            let kind = entry.file_type()?;
            let child = relative.join(entry.file_name());
            if kind.is_dir() {
                stack.push(child);
            } else if kind.is_file() {
                files.push(child);
            }
        }
    }
    files.sort();
    Ok(files)
}

impl AssetProcessor for DirectoryProcessor {
    fn name(&self) -> &str {
        "directory"
    }

    fn scan_container(
        &mut self,
        root: &Path,
        container: &str,
        storage: &mut AssetStorage,
    ) -> AssetResult<bool> {
        profile_function!();
        let dir = root.join(container);
        if !dir.is_dir() {
            return Ok(false);
        }

        let files = collect_files(&dir)?;
        let mut assets = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        for relative in files {
            let path = logical_path(container, &relative.to_string_lossy());
            if storage.contains(&path) || !seen.insert(path.clone()) {
                return Err(AssetError::DuplicateAsset { path });
            }
            let file = AssetFile::open(dir.join(&relative))?;
            assets.push(RawAsset::new(AssetHandle::new(path, file, 0, 0)));
        }

        tracing::debug!(
            "Directory '{}' provides {} assets",
            dir.display(),
            assets.len()
        );
        for asset in assets {
            storage.add_asset(Box::new(asset))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;

    #[test]
    fn test_scan_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let container = root.path().join("Data");
        fs::create_dir_all(container.join("units")).unwrap();
        fs::write(container.join("units/tank.dat"), b"tank").unwrap();
        fs::write(container.join("readme.txt"), b"hi").unwrap();

        let mut storage = AssetStorage::new();
        let mut processor = DirectoryProcessor::new();
        assert!(processor.scan_container(root.path(), "Data", &mut storage).unwrap());
        assert_eq!(
            storage.paths().collect::<Vec<_>>(),
            vec!["DATA/README.TXT", "DATA/UNITS/TANK.DAT"]
        );

        let tank = storage.get_asset_mut::<RawAsset>("DATA/UNITS/TANK.DAT").unwrap();
        assert_eq!(tank.handle_mut().read_to_end().unwrap(), b"tank");
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = AssetStorage::new();
        assert!(
            !DirectoryProcessor::new()
                .scan_container(root.path(), "NOPE", &mut storage)
                .unwrap()
        );
    }

    #[test]
    fn test_second_scan_reports_duplicates_without_partial_state() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("D")).unwrap();
        fs::write(root.path().join("D/A.BIN"), b"a").unwrap();

        let mut storage = AssetStorage::new();
        let mut processor = DirectoryProcessor::new();
        processor.scan_container(root.path(), "D", &mut storage).unwrap();
        let err = processor
            .scan_container(root.path(), "D", &mut storage)
            .unwrap_err();
        assert!(matches!(err, AssetError::DuplicateAsset { .. }));
        assert_eq!(storage.len(), 1);
    }
}
