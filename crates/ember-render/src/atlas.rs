//! Texture atlases with reference-counted storage and rectangle packing.
//!
//! Atlases live in an [`AtlasArena`]. Each atlas is a square pixel buffer in a
//! single [`PixelFormat`]; [`Image`]s are counted views into one atlas. The
//! arena frees an atlas once it is no longer pinned by its creator and the
//! last image referencing it has been released.
//!
//! # Example
//!
//! ```
//! use ember_core::geometry::{Rect, Size};
//! use ember_render::{AtlasArena, PixelFormat, RectPacker};
//!
//! let mut arena = AtlasArena::new();
//! let atlas = arena.allocate(64, PixelFormat::Indexed8);
//!
//! let mut packer = RectPacker::new(64);
//! let placed = packer.pack(&[Size::new(8, 8), Size::new(16, 4)]);
//! let region = placed[0].unwrap();
//!
//! let image = arena.sub_image(atlas, region, None).unwrap();
//! arena.write_pixels(&image, &[7u8; 64]).unwrap();
//!
//! // The creator lets go, the image keeps the atlas alive.
//! arena.unpin(atlas);
//! assert!(arena.get(atlas).is_some());
//! arena.release(image);
//! assert!(arena.get(atlas).is_none());
//! ```

use std::sync::Arc;

use ember_core::alloc::sparse_set::{IndexSlot, SparseSet};
use ember_core::geometry::{Rect, Size};
use ember_core::profiling::profile_function;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::image::{Image, PixelFormat};
use crate::palette::Palette;

/// Identifier of an atlas inside an [`AtlasArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasId(IndexSlot);

impl AtlasId {
    pub fn index(&self) -> u32 {
        self.0.index()
    }

    pub fn generation(&self) -> u32 {
        self.0.generation()
    }
}

struct AtlasSlot {
    size: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    /// Live [`Image`]s pointing into this atlas.
    refs: u32,
    /// Held by whoever allocated the atlas, usually the packer.
    pinned: bool,
}

impl AtlasSlot {
    fn is_unused(&self) -> bool {
        !self.pinned && self.refs == 0
    }
}

/// Read-only view of a live atlas.
#[derive(Debug, Clone, Copy)]
pub struct AtlasView<'a> {
    pub id: AtlasId,
    pub size: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
    pub refs: u32,
}

/// Owner of every atlas pixel buffer.
#[derive(Default)]
pub struct AtlasArena {
    atlases: SparseSet<AtlasSlot>,
}

impl AtlasArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed `size` x `size` atlas.
    ///
    /// The atlas starts pinned so it survives until its creator calls
    /// [`unpin`](Self::unpin), even if no image has been cut from it yet.
    pub fn allocate(&mut self, size: u32, format: PixelFormat) -> AtlasId {
        profile_function!();
        let pixels = vec![0u8; format.buffer_len(size, size)];
        let id = AtlasId(self.atlases.push(AtlasSlot {
            size,
            format,
            pixels,
            refs: 0,
            pinned: true,
        }));
        tracing::trace!("Allocated {:?} atlas {:?} of size {}", format, id, size);
        id
    }

    /// Allocate an atlas sized for a single image and return that image.
    pub fn allocate_image(
        &mut self,
        size: Size<u32>,
        format: PixelFormat,
        palette: Option<Arc<Palette>>,
    ) -> Image {
        let atlas = self.allocate(size.width.max(size.height), format);
        let region = Rect::new(0, 0, size.width, size.height);
        // The image takes over the pin; the region always fits.
        if let Some(slot) = self.slot_mut(atlas) {
            slot.refs = 1;
            slot.pinned = false;
        }
        Image {
            atlas,
            region,
            format,
            palette,
        }
    }

    /// Drop the creator's hold on an atlas.
    ///
    /// Returns `true` if this freed the atlas because no image references it.
    pub fn unpin(&mut self, id: AtlasId) -> bool {
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        slot.pinned = false;
        self.collect(id)
    }

    /// Cut a sub-image out of an atlas, taking one reference on it.
    pub fn sub_image(
        &mut self,
        id: AtlasId,
        region: Rect<u32>,
        palette: Option<Arc<Palette>>,
    ) -> RenderResult<Image> {
        let slot = self.slot_mut(id).ok_or(RenderError::StaleAtlas)?;
        let bounds = Rect::new(0, 0, slot.size, slot.size);
        if !bounds.contains_rect(&region) {
            return Err(RenderError::RegionOutOfBounds {
                region,
                atlas_size: slot.size,
            });
        }
        slot.refs += 1;
        Ok(Image {
            atlas: id,
            region,
            format: slot.format,
            palette,
        })
    }

    /// Take another reference to the atlas behind `image`.
    pub fn retain(&mut self, image: &Image) -> RenderResult<Image> {
        let slot = self.slot_mut(image.atlas).ok_or(RenderError::StaleAtlas)?;
        slot.refs += 1;
        Ok(Image {
            atlas: image.atlas,
            region: image.region,
            format: image.format,
            palette: image.palette.clone(),
        })
    }

    /// Give an image back. Returns `true` if its atlas was freed.
    pub fn release(&mut self, image: Image) -> bool {
        let id = image.atlas;
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        slot.refs = slot.refs.saturating_sub(1);
        self.collect(id)
    }

    fn collect(&mut self, id: AtlasId) -> bool {
        let unused = self.atlases.get(id.0).is_some_and(AtlasSlot::is_unused);
        if unused {
            self.atlases.remove(id.0);
            tracing::trace!("Freed atlas {:?}", id);
        }
        unused
    }

    fn slot_mut(&mut self, id: AtlasId) -> Option<&mut AtlasSlot> {
        self.atlases.get_mut(id.0)
    }

    /// Copy tightly packed pixel rows into the image's region.
    pub fn write_pixels(&mut self, image: &Image, data: &[u8]) -> RenderResult<()> {
        profile_function!();
        let expected = image.byte_len();
        if data.len() != expected {
            return Err(RenderError::PixelCountMismatch {
                expected,
                actual: data.len(),
                format: image.format,
            });
        }
        let slot = self.slot_mut(image.atlas).ok_or(RenderError::StaleAtlas)?;
        if slot.format != image.format {
            return Err(RenderError::FormatMismatch {
                expected: slot.format,
                actual: image.format,
            });
        }

        let bpp = slot.format.bytes_per_pixel();
        let row_len = image.region.width as usize * bpp;
        let stride = slot.size as usize * bpp;
        if row_len == 0 {
            return Ok(());
        }
        for (row, src) in data.chunks_exact(row_len).enumerate() {
            let start = (image.region.y as usize + row) * stride + image.region.x as usize * bpp;
            slot.pixels[start..start + row_len].copy_from_slice(src);
        }
        Ok(())
    }

    /// Copy the image's region out as tightly packed rows.
    pub fn read_pixels(&self, image: &Image) -> RenderResult<Vec<u8>> {
        let slot = self.atlases.get(image.atlas.0).ok_or(RenderError::StaleAtlas)?;
        let bpp = slot.format.bytes_per_pixel();
        let row_len = image.region.width as usize * bpp;
        let stride = slot.size as usize * bpp;
        let mut out = Vec::with_capacity(image.byte_len());
        for row in 0..image.region.height as usize {
            let start = (image.region.y as usize + row) * stride + image.region.x as usize * bpp;
            out.extend_from_slice(&slot.pixels[start..start + row_len]);
        }
        Ok(out)
    }

    /// Expand an image to RGBA8, resolving indexed pixels through its palette.
    pub fn image_to_rgba8(&self, image: &Image) -> RenderResult<Vec<u8>> {
        let pixels = self.read_pixels(image)?;
        match image.format {
            PixelFormat::Rgb565 => Ok(rgb565_to_rgba8(&pixels)),
            PixelFormat::Indexed8 => {
                let palette = image.palette.as_ref().ok_or(RenderError::MissingPalette)?;
                let mut out = Vec::with_capacity(pixels.len() * 4);
                for &index in &pixels {
                    let color = palette
                        .color(index as usize)
                        .ok_or(RenderError::PaletteIndexOutOfRange {
                            index: index as usize,
                            len: palette.len(),
                        })?;
                    out.extend_from_slice(&color.to_array());
                }
                Ok(out)
            }
        }
    }

    /// Expand a whole raw atlas to RGBA8.
    ///
    /// Indexed atlases mix sub-images with different palettes and cannot be
    /// expanded as a whole; they are rejected with `FormatMismatch`.
    pub fn atlas_to_rgba8(&self, id: AtlasId) -> RenderResult<Vec<u8>> {
        let slot = self.atlases.get(id.0).ok_or(RenderError::StaleAtlas)?;
        if slot.format != PixelFormat::Rgb565 {
            return Err(RenderError::FormatMismatch {
                expected: PixelFormat::Rgb565,
                actual: slot.format,
            });
        }
        Ok(rgb565_to_rgba8(&slot.pixels))
    }

    pub fn get(&self, id: AtlasId) -> Option<AtlasView<'_>> {
        self.atlases.get(id.0).map(|slot| view(id, slot))
    }

    /// Number of live images referencing the atlas.
    pub fn ref_count(&self, id: AtlasId) -> Option<u32> {
        self.atlases.get(id.0).map(|slot| slot.refs)
    }

    pub fn iter(&self) -> impl Iterator<Item = AtlasView<'_>> {
        self.atlases
            .iter()
            .map(|(slot_id, slot)| view(AtlasId(slot_id), slot))
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }

    /// Free every atlas. Images handed out earlier become stale.
    pub fn clear(&mut self) {
        self.atlases.clear();
    }
}

fn view(id: AtlasId, slot: &AtlasSlot) -> AtlasView<'_> {
    AtlasView {
        id,
        size: slot.size,
        format: slot.format,
        pixels: &slot.pixels,
        refs: slot.refs,
    }
}

fn rgb565_to_rgba8(pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 2);
    for pair in pixels.chunks_exact(2) {
        let color = Color::from_rgb565(u16::from_le_bytes([pair[0], pair[1]]));
        out.extend_from_slice(&color.to_array());
    }
    out
}

/// Guillotine packing tree.
#[derive(Debug, Clone)]
enum PackerNode {
    /// Empty node that can be split.
    Empty { rect: Rect<u32> },
    /// Filled node.
    Filled,
    /// Split node with two children.
    Split {
        left: Box<PackerNode>,
        right: Box<PackerNode>,
    },
}

impl PackerNode {
    fn new(rect: Rect<u32>) -> Self {
        Self::Empty { rect }
    }

    /// Try to insert a rectangle into this node.
    fn insert(&mut self, width: u32, height: u32) -> Option<Rect<u32>> {
        match self {
            PackerNode::Empty { rect } => {
                let rect = *rect;
                if width > rect.width || height > rect.height {
                    return None;
                }

                // Perfect fit
                if width == rect.width && height == rect.height {
                    *self = PackerNode::Filled;
                    return Some(rect);
                }

                // Split along the axis that leaves the larger leftover
                let horizontal_waste = rect.width - width;
                let vertical_waste = rect.height - height;

                let (left_rect, right_rect) = if horizontal_waste > vertical_waste {
                    (
                        Rect::new(rect.x, rect.y, width, rect.height),
                        Rect::new(rect.x + width, rect.y, rect.width - width, rect.height),
                    )
                } else {
                    (
                        Rect::new(rect.x, rect.y, rect.width, height),
                        Rect::new(rect.x, rect.y + height, rect.width, rect.height - height),
                    )
                };

                let mut left = Box::new(PackerNode::new(left_rect));
                let right = Box::new(PackerNode::new(right_rect));
                let result = left.insert(width, height);

                *self = PackerNode::Split { left, right };

                result
            }
            PackerNode::Filled => None,
            PackerNode::Split { left, right } => left
                .insert(width, height)
                .or_else(|| right.insert(width, height)),
        }
    }
}

/// Deterministic rectangle packer over one square atlas.
///
/// Rectangles are inserted tallest first (ties broken by width, then by
/// request order) into a guillotine tree, so the same request list always
/// produces the same layout. Placed rectangles never overlap and never leave
/// the atlas bounds.
#[derive(Debug, Clone)]
pub struct RectPacker {
    size: u32,
    root: PackerNode,
}

impl RectPacker {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            root: PackerNode::new(Rect::new(0, 0, size, size)),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Place a single rectangle into the remaining free space.
    pub fn insert(&mut self, size: Size<u32>) -> Option<Rect<u32>> {
        self.root.insert(size.width, size.height)
    }

    /// Place a batch, returning one slot per request in request order.
    ///
    /// `None` marks requests that did not fit into the remaining space.
    pub fn pack(&mut self, requests: &[Size<u32>]) -> Vec<Option<Rect<u32>>> {
        profile_function!();
        let mut order: Vec<usize> = (0..requests.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (requests[a], requests[b]);
            b.height.cmp(&a.height).then(b.width.cmp(&a.width))
        });

        let mut placements = vec![None; requests.len()];
        for index in order {
            placements[index] = self.insert(requests[index]);
        }
        placements
    }

    /// Forget every placement.
    pub fn clear(&mut self) {
        self.root = PackerNode::new(Rect::new(0, 0, self.size, self.size));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(rects: &[Rect<u32>]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{} overlaps {}", a, b);
            }
        }
    }

    #[test]
    fn test_packer_insertion() {
        let mut packer = RectPacker::new(256);

        assert!(packer.insert(Size::new(64, 64)).is_some());
        assert!(packer.insert(Size::new(32, 32)).is_some());
        // Too large
        assert!(packer.insert(Size::new(512, 512)).is_none());
    }

    #[test]
    fn test_packer_fills_exactly() {
        let mut packer = RectPacker::new(64);
        let requests = vec![Size::new(32, 32); 4];
        let placed: Vec<_> = packer.pack(&requests).into_iter().flatten().collect();
        assert_eq!(placed.len(), 4);
        assert_disjoint(&placed);
        assert!(packer.insert(Size::new(1, 1)).is_none());
    }

    #[test]
    fn test_packer_is_deterministic_and_in_bounds() {
        let requests: Vec<_> = (1..40u32)
            .map(|i| Size::new((i * 7) % 50 + 3, (i * 13) % 40 + 3))
            .collect();
        let first = RectPacker::new(256).pack(&requests);
        let second = RectPacker::new(256).pack(&requests);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a, b);
        }

        let bounds = Rect::new(0, 0, 256, 256);
        let placed: Vec<_> = first.into_iter().flatten().collect();
        assert!(!placed.is_empty());
        assert!(placed.iter().all(|r| bounds.contains_rect(r)));
        assert_disjoint(&placed);
    }

    #[test]
    fn test_packer_reports_leftovers() {
        let mut packer = RectPacker::new(100);
        let placed = packer.pack(&[Size::new(60, 60), Size::new(60, 60)]);
        assert_eq!(placed.iter().filter(|p| p.is_some()).count(), 1);
    }

    #[test]
    fn test_arena_refcount_frees_on_last_release() {
        let mut arena = AtlasArena::new();
        let atlas = arena.allocate(16, PixelFormat::Rgb565);

        let a = arena.sub_image(atlas, Rect::new(0, 0, 4, 4), None).unwrap();
        let b = arena.sub_image(atlas, Rect::new(4, 0, 4, 4), None).unwrap();
        let c = arena.retain(&a).unwrap();
        assert_eq!(arena.ref_count(atlas), Some(3));

        assert!(!arena.unpin(atlas));
        assert!(!arena.release(a));
        assert!(!arena.release(b));
        assert_eq!(arena.ref_count(atlas), Some(1));
        assert!(arena.release(c));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_unpin_without_images_frees() {
        let mut arena = AtlasArena::new();
        let atlas = arena.allocate(8, PixelFormat::Indexed8);
        assert_eq!(arena.len(), 1);
        assert!(arena.unpin(atlas));
        assert!(arena.get(atlas).is_none());
    }

    #[test]
    fn test_sub_image_bounds() {
        let mut arena = AtlasArena::new();
        let atlas = arena.allocate(8, PixelFormat::Indexed8);
        let err = arena
            .sub_image(atlas, Rect::new(4, 4, 5, 1), None)
            .unwrap_err();
        assert!(matches!(err, RenderError::RegionOutOfBounds { .. }));
        assert_eq!(arena.ref_count(atlas), Some(0));
    }

    #[test]
    fn test_write_and_read_pixels() {
        let mut arena = AtlasArena::new();
        let atlas = arena.allocate(4, PixelFormat::Rgb565);
        let image = arena.sub_image(atlas, Rect::new(1, 2, 2, 2), None).unwrap();

        let data: Vec<u8> = (0..8).collect();
        arena.write_pixels(&image, &data).unwrap();
        assert_eq!(arena.read_pixels(&image).unwrap(), data);

        // Row 2 of the atlas starts at byte 16; the image starts one pixel in.
        let view = arena.get(atlas).unwrap();
        assert_eq!(&view.pixels[18..22], &[0, 1, 2, 3]);
        assert_eq!(&view.pixels[26..30], &[4, 5, 6, 7]);

        let short = arena.write_pixels(&image, &data[..7]).unwrap_err();
        assert_eq!(
            short,
            RenderError::PixelCountMismatch {
                expected: 8,
                actual: 7,
                format: PixelFormat::Rgb565
            }
        );
    }

    #[test]
    fn test_indexed_to_rgba8_uses_palette() {
        let mut palette = Palette::new(4, false);
        palette.set_color(1, Color::rgb(10, 20, 30)).unwrap();
        let palette = Arc::new(palette);

        let mut arena = AtlasArena::new();
        let image = arena.allocate_image(Size::new(2, 1), PixelFormat::Indexed8, Some(palette));
        arena.write_pixels(&image, &[1, 0]).unwrap();

        let rgba = arena.image_to_rgba8(&image).unwrap();
        assert_eq!(rgba, vec![10, 20, 30, 255, 0, 0, 0, 0]);

        let atlas = image.atlas();
        assert!(arena.atlas_to_rgba8(atlas).is_err());
        assert!(arena.release(image));
    }
}
