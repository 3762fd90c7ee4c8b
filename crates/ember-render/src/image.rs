//! Sub-image descriptors over atlas storage.

use std::fmt;
use std::sync::Arc;

use ember_core::geometry::{Rect, Size};

use crate::atlas::AtlasId;
use crate::palette::Palette;

/// Pixel layout of an atlas and every sub-image it backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One byte per pixel, an index into a [`Palette`].
    Indexed8,
    /// Two bytes per pixel, little-endian packed 5-6-5 color.
    Rgb565,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Indexed8 => 1,
            PixelFormat::Rgb565 => 2,
        }
    }

    pub const fn is_indexed(self) -> bool {
        matches!(self, PixelFormat::Indexed8)
    }

    /// Bytes needed for `width` x `height` pixels.
    pub fn buffer_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A rectangular view into an atlas owned by an [`AtlasArena`](crate::AtlasArena).
///
/// An `Image` is one counted reference to its atlas: the arena hands them out
/// through [`AtlasArena::sub_image`](crate::AtlasArena::sub_image) and
/// [`AtlasArena::retain`](crate::AtlasArena::retain), and the atlas pixels are
/// freed once every image has been given back with
/// [`AtlasArena::release`](crate::AtlasArena::release). Copies only come from
/// the arena, so the type is not `Clone`.
#[derive(PartialEq, Eq)]
pub struct Image {
    pub(crate) atlas: AtlasId,
    pub(crate) region: Rect<u32>,
    pub(crate) format: PixelFormat,
    pub(crate) palette: Option<Arc<Palette>>,
}

impl Image {
    pub fn atlas(&self) -> AtlasId {
        self.atlas
    }

    /// Pixel rectangle inside the atlas.
    pub fn region(&self) -> Rect<u32> {
        self.region
    }

    pub fn size(&self) -> Size<u32> {
        self.region.size()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn is_indexed(&self) -> bool {
        self.format.is_indexed()
    }

    pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.palette.as_ref()
    }

    /// Bind the color table used to resolve indexed pixels.
    pub fn set_palette(&mut self, palette: Option<Arc<Palette>>) {
        self.palette = palette;
    }

    /// Bytes a full pixel upload into this image must contain.
    pub fn byte_len(&self) -> usize {
        self.format
            .buffer_len(self.region.width, self.region.height)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("atlas", &self.atlas)
            .field("region", &self.region)
            .field("format", &self.format)
            .field("palette", &self.palette.as_ref().map(|p| p.len()))
            .finish()
    }
}
