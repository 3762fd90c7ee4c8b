//! Byte builders for container fixtures.

/// An image record: `u16` width, `u16` height, two reserved bytes, pixels.
pub fn dat_bytes(width: u16, height: u16, pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + pixels.len());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(pixels);
    out
}

/// A palette record: consecutive RGB triplets.
pub fn pal_bytes(colors: &[[u8; 3]]) -> Vec<u8> {
    colors.iter().flatten().copied().collect()
}

/// A grayscale ramp palette with `len` entries.
pub fn ramp_palette(len: usize) -> Vec<u8> {
    let colors: Vec<[u8; 3]> = (0..len).map(|i| [i as u8; 3]).collect();
    pal_bytes(&colors)
}

/// Little-endian RGB565 pixels.
pub fn rgb565_bytes(pixels: &[u16]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

/// Builder for packed `.WD` archives.
///
/// Layout: `u32` entry count, then per entry `u32` offset, `u32` length,
/// `u16` name length and the name bytes, followed by the entry data.
/// Offsets are absolute within the archive.
#[derive(Debug, Default, Clone)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.entries.push((name.into(), data.into()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let table_len: usize = 4 + self
            .entries
            .iter()
            .map(|(name, _)| 4 + 4 + 2 + name.len())
            .sum::<usize>();

        let mut table = Vec::with_capacity(table_len);
        let mut data = Vec::new();
        table.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (name, bytes) in &self.entries {
            let offset = table_len + data.len();
            table.extend_from_slice(&(offset as u32).to_le_bytes());
            table.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            table.extend_from_slice(&(name.len() as u16).to_le_bytes());
            table.extend_from_slice(name.as_bytes());
            data.extend_from_slice(bytes);
        }
        table.extend_from_slice(&data);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dat_header() {
        let bytes = dat_bytes(4, 2, &[9; 8]);
        assert_eq!(&bytes[..6], &[4, 0, 2, 0, 0, 0]);
        assert_eq!(bytes.len(), 14);
    }

    #[test]
    fn test_archive_offsets_point_at_data() {
        let archive = ArchiveBuilder::new()
            .entry("A.BIN", vec![1, 2, 3])
            .entry("B.BIN", vec![4])
            .build();

        assert_eq!(u32::from_le_bytes(archive[0..4].try_into().unwrap()), 2);
        let offset = u32::from_le_bytes(archive[4..8].try_into().unwrap()) as usize;
        let length = u32::from_le_bytes(archive[8..12].try_into().unwrap()) as usize;
        assert_eq!(&archive[offset..offset + length], &[1, 2, 3]);
        assert_eq!(archive.last(), Some(&4));
    }
}
