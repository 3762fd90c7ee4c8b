//! Containers stored as packed `.WD` archives.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! u32 count
//! count x { u32 offset, u32 length, u16 name_len, name_len bytes of name }
//! entry data, addressed by absolute offset
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use ember_core::alloc::HashSet;
use ember_core::profiling::profile_function;

use crate::asset::RawAsset;
use crate::error::{AssetError, AssetResult};
use crate::file::AssetFile;
use crate::handle::AssetHandle;
use crate::processor::{AssetProcessor, logical_path};
use crate::storage::AssetStorage;

/// Archive file extension, matched case-insensitively.
pub const ARCHIVE_EXTENSION: &str = "WD";

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct EntryHeader {
    offset: u32,
    length: u32,
    name_len: u16,
}

/// Registers every entry of `root/<container>.WD` as a raw asset.
#[derive(Debug, Default)]
pub struct ArchiveProcessor;

impl ArchiveProcessor {
    pub fn new() -> Self {
        Self
    }

    fn find_archive(root: &Path, container: &str) -> Option<PathBuf> {
        let wanted = format!("{}.{}", container, ARCHIVE_EXTENSION);
        fs::read_dir(root)
            .ok()?
            .filter_map(Result::ok)
            .find(|entry| {
                entry.file_name().to_string_lossy().eq_ignore_ascii_case(&wanted)
                    && entry.file_type().is_ok_and(|kind| kind.is_file())
            })
            .map(|entry| entry.path())
    }
}

/// A table entry that passed validation.
struct Entry {
    name: String,
    offset: u64,
    length: u64,
}

fn read_table(handle: &mut AssetHandle) -> AssetResult<Vec<Entry>> {
    let path = handle.path().to_string();
    let file_len = handle.size()?;
    let truncated = |err: AssetError| AssetError::decode(&path, format!("truncated entry table: {}", err));

    let count = u32::from_le(handle.read_pod::<u32>().map_err(truncated)?);
    let min_entry = std::mem::size_of::<EntryHeader>() as u64;
    if u64::from(count) * min_entry > file_len {
        return Err(AssetError::decode(
            &path,
            format!("{} entries cannot fit in {} bytes", count, file_len),
        ));
    }

    let mut entries = Vec::with_capacity(count as usize);
    for index in 0..count {
        let header: EntryHeader = handle.read_pod().map_err(truncated)?;
        let offset = u64::from(u32::from_le(header.offset));
        let length = u64::from(u32::from_le(header.length));
        let name_len = usize::from(u16::from_le(header.name_len));
        if name_len == 0 {
            return Err(AssetError::decode(&path, format!("entry {} has an empty name", index)));
        }

        let mut name = vec![0u8; name_len];
        handle.read_exact(&mut name).map_err(truncated)?;
        let name = String::from_utf8(name)
            .ok()
            .filter(|name| name.is_ascii())
            .ok_or_else(|| AssetError::decode(&path, format!("entry {} name is not ASCII", index)))?;

        if offset + length > file_len {
            return Err(AssetError::decode(
                &path,
                format!(
                    "entry '{}' spans {}..{} outside of {} bytes",
                    name,
                    offset,
                    offset + length,
                    file_len
                ),
            ));
        }
        entries.push(Entry {
            name,
            offset,
            length,
        });
    }
    Ok(entries)
}

impl AssetProcessor for ArchiveProcessor {
    fn name(&self) -> &str {
        "archive"
    }

    fn scan_container(
        &mut self,
        root: &Path,
        container: &str,
        storage: &mut AssetStorage,
    ) -> AssetResult<bool> {
        profile_function!();
        let Some(archive) = Self::find_archive(root, container) else {
            return Ok(false);
        };

        let file = AssetFile::open(&archive)?;
        let mut handle = AssetHandle::new(archive.display().to_string(), file.clone(), 0, 0);
        let entries = read_table(&mut handle)?;

        let mut assets = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for entry in entries {
            let path = logical_path(container, &entry.name);
            if storage.contains(&path) || !seen.insert(path.clone()) {
                return Err(AssetError::DuplicateAsset { path });
            }
            assets.push(RawAsset::new(AssetHandle::bounded(
                path,
                file.clone(),
                entry.offset,
                entry.length,
            )));
        }

        tracing::debug!(
            "Archive '{}' provides {} assets",
            archive.display(),
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
    use ember_test_utils::fixtures::ArchiveBuilder;

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) {
        fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn test_scan_archive() {
        let root = tempfile::tempdir().unwrap();
        let archive = ArchiveBuilder::new()
            .entry("units\\tank.dat", b"TANK".to_vec())
            .entry("ui/cursor.pal", b"RGB".to_vec())
            .build();
        write_archive(root.path(), "main.wd", &archive);

        let mut storage = AssetStorage::new();
        assert!(
            ArchiveProcessor::new()
                .scan_container(root.path(), "MAIN", &mut storage)
                .unwrap()
        );
        assert_eq!(
            storage.paths().collect::<Vec<_>>(),
            vec!["MAIN/UNITS/TANK.DAT", "MAIN/UI/CURSOR.PAL"]
        );
        let tank = storage.get_asset_mut::<RawAsset>("MAIN/UNITS/TANK.DAT").unwrap();
        assert_eq!(tank.handle_mut().read_to_end().unwrap(), b"TANK");
    }

    #[test]
    fn test_missing_archive() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = AssetStorage::new();
        assert!(
            !ArchiveProcessor::new()
                .scan_container(root.path(), "MAIN", &mut storage)
                .unwrap()
        );
    }

    #[test]
    fn test_truncated_table() {
        let root = tempfile::tempdir().unwrap();
        let mut archive = ArchiveBuilder::new().entry("A", b"abc".to_vec()).build();
        archive.truncate(8);
        write_archive(root.path(), "MAIN.WD", &archive);

        let mut storage = AssetStorage::new();
        let err = ArchiveProcessor::new()
            .scan_container(root.path(), "MAIN", &mut storage)
            .unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_entry_outside_file() {
        let root = tempfile::tempdir().unwrap();
        let mut archive = ArchiveBuilder::new().entry("A", b"abc".to_vec()).build();
        // Bump the entry length past the end of the file.
        archive[8..12].copy_from_slice(&100u32.to_le_bytes());
        write_archive(root.path(), "MAIN.WD", &archive);

        let mut storage = AssetStorage::new();
        let err = ArchiveProcessor::new()
            .scan_container(root.path(), "MAIN", &mut storage)
            .unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_empty_entry_has_empty_window() {
        let root = tempfile::tempdir().unwrap();
        let archive = ArchiveBuilder::new()
            .entry("EMPTY.BIN", Vec::<u8>::new())
            .entry("NEXT.BIN", b"next".to_vec())
            .build();
        write_archive(root.path(), "MAIN.WD", &archive);

        let mut storage = AssetStorage::new();
        ArchiveProcessor::new()
            .scan_container(root.path(), "MAIN", &mut storage)
            .unwrap();
        let empty = storage.get_asset_mut::<RawAsset>("MAIN/EMPTY.BIN").unwrap();
        assert_eq!(empty.handle_mut().size().unwrap(), 0);
        assert!(empty.handle_mut().read_to_end().unwrap().is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let root = tempfile::tempdir().unwrap();
        let archive = ArchiveBuilder::new().entry("", b"abc".to_vec()).build();
        write_archive(root.path(), "MAIN.WD", &archive);

        let mut storage = AssetStorage::new();
        assert!(
            ArchiveProcessor::new()
                .scan_container(root.path(), "MAIN", &mut storage)
                .is_err()
        );
    }
}
