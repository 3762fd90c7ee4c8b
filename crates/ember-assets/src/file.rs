//! Backing storage shared by asset handles.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AssetError, AssetResult};

/// A container file that any number of asset handles read from.
///
/// Reads are positional so handles sharing one file never disturb each
/// other's cursor.
#[derive(Debug)]
pub enum AssetFile {
    /// An open file on disk.
    Disk { path: PathBuf, file: File },
    /// Bytes held in memory, for embedded data.
    Memory { name: String, bytes: Vec<u8> },
}

impl AssetFile {
    /// Open a file on disk for shared reading.
    pub fn open(path: impl AsRef<Path>) -> AssetResult<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Arc::new(AssetFile::Disk { path, file }))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(AssetFile::Memory {
            name: name.into(),
            bytes: bytes.into(),
        })
    }

    /// Human-readable origin of the data.
    pub fn origin(&self) -> String {
        match self {
            AssetFile::Disk { path, .. } => path.display().to_string(),
            AssetFile::Memory { name, .. } => name.clone(),
        }
    }

    /// Total length in bytes.
    pub fn len(&self) -> io::Result<u64> {
        match self {
            AssetFile::Disk { file, .. } => Ok(file.metadata()?.len()),
            AssetFile::Memory { bytes, .. } => Ok(bytes.len() as u64),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fill as much of `buf` as possible starting at `offset`.
    ///
    /// Returns the number of bytes read, short only at end of file.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            AssetFile::Disk { file, .. } => {
                let mut filled = 0;
                while filled < buf.len() {
                    match read_at(file, &mut buf[filled..], offset + filled as u64) {
                        Ok(0) => break,
                        Ok(n) => filled += n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(filled)
            }
            AssetFile::Memory { bytes, .. } => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
                let n = buf.len().min(bytes.len() - start);
                buf[..n].copy_from_slice(&bytes[start..start + n]);
                Ok(n)
            }
        }
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(not(any(unix, windows)))]
fn read_at(_file: &File, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "positional reads are not available on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_read_at_clamps() {
        let file = AssetFile::from_bytes("mem", vec![1, 2, 3, 4]);
        let mut buf = [0u8; 3];
        assert_eq!(file.read_at(2, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(file.read_at(10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_disk_read_at() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let file = AssetFile::open(tmp.path()).unwrap();

        assert_eq!(file.len().unwrap(), 11);
        let mut buf = [0u8; 5];
        assert_eq!(file.read_at(6, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_open_missing_reports_path() {
        let err = AssetFile::open("/definitely/not/here.wd").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.wd"));
    }
}
