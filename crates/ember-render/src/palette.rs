//! Fixed-size color tables for indexed images.

use crate::color::Color;
use crate::error::{RenderError, RenderResult};

/// Number of colors in a game palette.
pub const PALETTE_SIZE: usize = 256;

/// Colors appended when a palette is created with extra slots.
pub const PALETTE_EXTRA_COLORS: usize = 16;

/// A fixed-size color table.
///
/// Every entry starts out transparent black. Palettes with `extra` set carry
/// [`PALETTE_EXTRA_COLORS`] additional slots after the base table, used for
/// colors that are not part of the game data (e.g. player tints).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
    base_len: usize,
    extra: bool,
}

impl Palette {
    pub fn new(size: usize, extra: bool) -> Self {
        let len = if extra { size + PALETTE_EXTRA_COLORS } else { size };
        Self {
            colors: vec![Color::TRANSPARENT; len],
            base_len: size,
            extra,
        }
    }

    /// Total number of slots, extra ones included.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Number of slots filled from game data.
    pub fn base_len(&self) -> usize {
        self.base_len
    }

    pub fn has_extra(&self) -> bool {
        self.extra
    }

    pub fn color(&self, index: usize) -> Option<Color> {
        self.colors.get(index).copied()
    }

    pub fn set_color(&mut self, index: usize, color: Color) -> RenderResult<()> {
        let len = self.colors.len();
        let slot = self
            .colors
            .get_mut(index)
            .ok_or(RenderError::PaletteIndexOutOfRange { index, len })?;
        *slot = color;
        Ok(())
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Raw RGBA bytes, one 4-byte entry per slot.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_palette_is_transparent() {
        let palette = Palette::new(PALETTE_SIZE, false);
        assert_eq!(palette.len(), PALETTE_SIZE);
        assert!(palette.colors().iter().all(|c| *c == Color::TRANSPARENT));
        assert_eq!(palette.as_bytes().len(), PALETTE_SIZE * 4);
    }

    #[test]
    fn test_extra_colors() {
        let palette = Palette::new(PALETTE_SIZE, true);
        assert_eq!(palette.len(), PALETTE_SIZE + PALETTE_EXTRA_COLORS);
        assert_eq!(palette.base_len(), PALETTE_SIZE);
        assert!(palette.has_extra());
    }

    #[test]
    fn test_set_color_bounds() {
        let mut palette = Palette::new(4, false);
        palette.set_color(3, Color::WHITE).unwrap();
        assert_eq!(palette.color(3), Some(Color::WHITE));
        assert_eq!(
            palette.set_color(4, Color::WHITE),
            Err(RenderError::PaletteIndexOutOfRange { index: 4, len: 4 })
        );
    }
}
