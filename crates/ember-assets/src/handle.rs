//! Cursor-addressed views into container files.

use std::fmt;
use std::sync::Arc;

use bytemuck::Pod;

use crate::error::{AssetError, AssetResult};
use crate::file::AssetFile;

/// A window of bytes inside an [`AssetFile`] plus a read cursor.
///
/// The handle never owns file content. Its window is either bounded to a
/// fixed length (possibly empty) or runs to the end of the file. Positions
/// reported by [`tell`](Self::tell) and accepted by [`seek`](Self::seek) are
/// relative to the window start.
///
/// An I/O failure while reading faults the handle: every later operation
/// fails immediately with [`AssetError::Poisoned`].
pub struct AssetHandle {
    path: String,
    file: Arc<AssetFile>,
    offset: u64,
    /// `None` runs to the end of the file.
    length: Option<u64>,
    cursor: u64,
    faulted: bool,
}

impl AssetHandle {
    /// A handle over `length` bytes at `offset`; a `length` of `0` runs to the
    /// end of the file.
    pub fn new(path: impl Into<String>, file: Arc<AssetFile>, offset: u64, length: u64) -> Self {
        Self::with_window(path, file, offset, (length != 0).then_some(length))
    }

    /// A handle over exactly `length` bytes at `offset`, even when `length`
    /// is zero.
    pub fn bounded(path: impl Into<String>, file: Arc<AssetFile>, offset: u64, length: u64) -> Self {
        Self::with_window(path, file, offset, Some(length))
    }

    fn with_window(
        path: impl Into<String>,
        file: Arc<AssetFile>,
        offset: u64,
        length: Option<u64>,
    ) -> Self {
        Self {
            path: path.into(),
            file,
            offset,
            length,
            cursor: 0,
            faulted: false,
        }
    }

    /// Logical path, unique within a registry.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file(&self) -> &Arc<AssetFile> {
        &self.file
    }

    /// Start of the window within the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// A new handle over `len` bytes starting `start` bytes into this window.
    pub fn slice(&self, path: impl Into<String>, start: u64, len: u64) -> AssetResult<AssetHandle> {
        self.check()?;
        let size = self.size()?;
        if start.checked_add(len).is_none_or(|end| end > size) {
            return Err(AssetError::SeekOutOfWindow {
                requested: start.saturating_add(len) as i64,
                len: size,
            });
        }
        Ok(AssetHandle::bounded(path, self.file.clone(), self.offset + start, len))
    }

    fn check(&self) -> AssetResult<()> {
        if self.faulted {
            return Err(AssetError::Poisoned {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    fn fault(&mut self, err: impl fmt::Display) {
        tracing::warn!("Asset '{}' faulted: {}", self.path, err);
        self.faulted = true;
    }

    /// Current read position.
    pub fn tell(&self) -> AssetResult<u64> {
        self.check()?;
        Ok(self.cursor)
    }

    /// Window length in bytes.
    pub fn size(&self) -> AssetResult<u64> {
        self.check()?;
        if let Some(length) = self.length {
            return Ok(length);
        }
        let file_len = self.file.len().map_err(|source| AssetError::Io {
            path: self.file.origin().into(),
            source,
        })?;
        Ok(file_len.saturating_sub(self.offset))
    }

    /// Move the cursor and return the new position.
    ///
    /// `pos` is absolute when `from_start` is set, otherwise relative to the
    /// cursor. Targets outside `[0, size]` fail and leave the cursor alone.
    pub fn seek(&mut self, pos: i64, from_start: bool) -> AssetResult<u64> {
        let len = self.size()?;
        let base = if from_start { 0 } else { self.cursor as i64 };
        let target = base.saturating_add(pos);
        if target < 0 || target as u64 > len {
            return Err(AssetError::SeekOutOfWindow {
                requested: target,
                len,
            });
        }
        self.cursor = target as u64;
        Ok(self.cursor)
    }

    /// Read up to `buf.len()` bytes, returning how many were transferred.
    ///
    /// Returns 0 at the end of the window and on any error; an I/O error
    /// additionally faults the handle.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.faulted {
            return 0;
        }
        let len = match self.size() {
            Ok(len) => len,
            Err(err) => {
                self.fault(err);
                return 0;
            }
        };
        let remaining = len.saturating_sub(self.cursor);
        let amount = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        match self.file.read_at(self.offset + self.cursor, &mut buf[..amount]) {
            Ok(n) => {
                self.cursor += n as u64;
                n
            }
            Err(err) => {
                self.fault(err);
                0
            }
        }
    }

    /// Fill `buf` completely or fail.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> AssetResult<()> {
        self.check()?;
        let n = self.read(buf);
        self.check()?;
        if n != buf.len() {
            return Err(AssetError::ShortRead {
                path: self.path.clone(),
                expected: buf.len(),
                actual: n,
            });
        }
        Ok(())
    }

    /// Read a fixed-size plain-old-data record.
    ///
    /// Fields are taken in file byte order; convert multi-byte fields with
    /// `from_le` as needed.
    pub fn read_pod<T: Pod>(&mut self) -> AssetResult<T> {
        let mut value = T::zeroed();
        self.read_exact(bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    /// Read everything from the cursor to the end of the window.
    pub fn read_to_end(&mut self) -> AssetResult<Vec<u8>> {
        let len = self.size()?;
        let remaining = len.saturating_sub(self.cursor);
        let mut buf = vec![0u8; usize::try_from(remaining).unwrap_or(usize::MAX)];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Check whether the next bytes equal `literal`.
    ///
    /// On a match the cursor moves past the literal, otherwise it is restored.
    pub fn matches(&mut self, literal: &[u8]) -> AssetResult<bool> {
        self.check()?;
        let start = self.cursor;
        let mut buf = vec![0u8; literal.len()];
        let n = self.read(&mut buf);
        self.check()?;
        if n == literal.len() && buf == literal {
            return Ok(true);
        }
        self.cursor = start;
        Ok(false)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("path", &self.path)
            .field("file", &self.file.origin())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("cursor", &self.cursor)
            .field("faulted", &self.faulted)
            .finish()
    }
}
