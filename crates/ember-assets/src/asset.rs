//! Typed assets built on top of [`AssetHandle`].

use std::any::Any;
use std::sync::Arc;

use ember_core::geometry::Size;
use ember_render::{AtlasArena, Color, Image, PALETTE_SIZE, Palette, PixelFormat};

use crate::error::{AssetError, AssetResult};
use crate::handle::AssetHandle;

/// Anything the registry can store under a logical path.
pub trait Asset: Any {
    fn handle(&self) -> &AssetHandle;

    fn handle_mut(&mut self) -> &mut AssetHandle;

    /// Short name of the concrete asset kind, for diagnostics.
    fn kind(&self) -> &'static str;

    fn path(&self) -> &str {
        self.handle().path()
    }
}

/// Undecoded bytes registered by a container scan.
#[derive(Debug)]
pub struct RawAsset {
    handle: AssetHandle,
}

impl RawAsset {
    pub fn new(handle: AssetHandle) -> Self {
        Self { handle }
    }

    pub fn into_handle(self) -> AssetHandle {
        self.handle
    }
}

impl Asset for RawAsset {
    fn handle(&self) -> &AssetHandle {
        &self.handle
    }

    fn handle_mut(&mut self) -> &mut AssetHandle {
        &mut self.handle
    }

    fn kind(&self) -> &'static str {
        "raw"
    }
}

/// Pixel data with declared dimensions, optionally indexed through a palette.
///
/// The handle window covers only the pixel bytes: `width * height` of them
/// when a palette is linked, `width * height * 2` (RGB565) otherwise.
#[derive(Debug)]
pub struct ImageAsset {
    handle: AssetHandle,
    size: Size<i32>,
    /// Logical path of the linked [`PaletteAsset`].
    palette: Option<String>,
    image: Option<Image>,
}

impl ImageAsset {
    pub fn new(handle: AssetHandle, size: Size<i32>, palette: Option<String>) -> Self {
        Self {
            handle,
            size,
            palette,
            image: None,
        }
    }

    /// Declared dimensions.
    pub fn size(&self) -> Size<i32> {
        self.size
    }

    pub fn palette(&self) -> Option<&str> {
        self.palette.as_deref()
    }

    pub fn has_palette(&self) -> bool {
        self.palette.is_some()
    }

    /// Resolved image, present after a successful refresh.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    fn pixel_format(&self) -> PixelFormat {
        if self.has_palette() {
            PixelFormat::Indexed8
        } else {
            PixelFormat::Rgb565
        }
    }

    /// Bind `candidate` to this asset, decoding the asset's bytes into it.
    ///
    /// `None` clears the current image. On failure the candidate is handed
    /// back to the arena and the current image is left untouched; on success
    /// the previous image is released.
    pub fn assign_image(
        &mut self,
        candidate: Option<Image>,
        arena: &mut AtlasArena,
    ) -> AssetResult<()> {
        let Some(candidate) = candidate else {
            self.clear_image(arena);
            return Ok(());
        };

        match self.load_into(&candidate, arena) {
            Ok(()) => {
                if let Some(previous) = self.image.replace(candidate) {
                    arena.release(previous);
                }
                Ok(())
            }
            Err(err) => {
                arena.release(candidate);
                Err(err)
            }
        }
    }

    fn load_into(&mut self, candidate: &Image, arena: &mut AtlasArena) -> AssetResult<()> {
        let path = self.handle.path();
        if self.has_palette() != candidate.is_indexed() {
            return Err(AssetError::PaletteMismatch {
                path: path.to_string(),
                expects_palette: self.has_palette(),
            });
        }
        if candidate.is_indexed() && candidate.palette().is_none() {
            return Err(ember_render::RenderError::MissingPalette.into());
        }

        let actual = candidate.size();
        if i64::from(self.size.width) != i64::from(actual.width)
            || i64::from(self.size.height) != i64::from(actual.height)
        {
            return Err(AssetError::SizeMismatch {
                path: path.to_string(),
                expected: self.size,
                actual,
            });
        }

        self.handle.seek(0, true)?;
        let required = self.pixel_format().buffer_len(actual.width, actual.height);
        let available = self.handle.size()?;
        if available != required as u64 {
            return Err(AssetError::decode(
                self.handle.path(),
                format!(
                    "expected {} bytes of {:?} pixels, found {}",
                    required,
                    self.pixel_format(),
                    available
                ),
            ));
        }

        let mut pixels = vec![0u8; required];
        self.handle.read_exact(&mut pixels)?;
        arena.write_pixels(candidate, &pixels)?;
        Ok(())
    }

    /// Release the resolved image, if any.
    pub fn clear_image(&mut self, arena: &mut AtlasArena) {
        if let Some(image) = self.image.take() {
            arena.release(image);
        }
    }
}

impl Asset for ImageAsset {
    fn handle(&self) -> &AssetHandle {
        &self.handle
    }

    fn handle_mut(&mut self) -> &mut AssetHandle {
        &mut self.handle
    }

    fn kind(&self) -> &'static str {
        "image"
    }
}

/// A color table stored as RGB triplets.
#[derive(Debug)]
pub struct PaletteAsset {
    handle: AssetHandle,
    extra: bool,
    palette: Option<Arc<Palette>>,
}

impl PaletteAsset {
    pub fn new(handle: AssetHandle, extra: bool) -> Self {
        Self {
            handle,
            extra,
            palette: None,
        }
    }

    /// Resolved color table, present after a successful refresh.
    pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.palette.as_ref()
    }

    pub fn assign_palette(&mut self, palette: Option<Arc<Palette>>) {
        self.palette = palette;
    }

    /// Allocate a fresh table and fill it from the asset bytes.
    pub fn decode(&mut self) -> AssetResult<Arc<Palette>> {
        self.handle.seek(0, true)?;
        let bytes = self.handle.read_to_end()?;
        if bytes.len() % 3 != 0 {
            return Err(AssetError::decode(
                self.handle.path(),
                format!("palette length {} is not a multiple of 3", bytes.len()),
            ));
        }
        let count = bytes.len() / 3;
        if count > PALETTE_SIZE {
            return Err(AssetError::decode(
                self.handle.path(),
                format!("palette has {} colors, at most {} allowed", count, PALETTE_SIZE),
            ));
        }

        let mut palette = Palette::new(PALETTE_SIZE, self.extra);
        for (index, rgb) in bytes.chunks_exact(3).enumerate() {
            palette.set_color(index, Color::rgb(rgb[0], rgb[1], rgb[2]))?;
        }
        let palette = Arc::new(palette);
        self.palette = Some(palette.clone());
        Ok(palette)
    }
}

impl Asset for PaletteAsset {
    fn handle(&self) -> &AssetHandle {
        &self.handle
    }

    fn handle_mut(&mut self) -> &mut AssetHandle {
        &mut self.handle
    }

    fn kind(&self) -> &'static str {
        "palette"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::AssetFile;
    use ember_core::geometry::Rect;

    fn image_asset(bytes: Vec<u8>, size: Size<i32>, palette: Option<&str>) -> ImageAsset {
        let handle = AssetHandle::new("IMG.DAT", AssetFile::from_bytes("mem", bytes), 0, 0);
        ImageAsset::new(handle, size, palette.map(String::from))
    }

    fn palette() -> Arc<Palette> {
        Arc::new(Palette::new(PALETTE_SIZE, false))
    }

    #[test]
    fn test_assign_indexed() {
        let mut arena = AtlasArena::new();
        let mut asset = image_asset((0..16).collect(), Size::new(4, 4), Some("IMG.PAL"));
        let image = arena.allocate_image(Size::new(4, 4), PixelFormat::Indexed8, Some(palette()));

        asset.assign_image(Some(image), &mut arena).unwrap();
        let stored = asset.image().unwrap();
        assert_eq!(stored.byte_len(), 16);
        assert_eq!(arena.read_pixels(stored).unwrap(), (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_assign_raw_into_atlas_region() {
        let mut arena = AtlasArena::new();
        let atlas = arena.allocate(8, PixelFormat::Rgb565);
        let image = arena.sub_image(atlas, Rect::new(2, 2, 2, 2), None).unwrap();
        arena.unpin(atlas);

        let mut asset = image_asset(vec![0xAB; 8], Size::new(2, 2), None);
        asset.assign_image(Some(image), &mut arena).unwrap();
        assert_eq!(asset.image().unwrap().byte_len(), 8);
        assert_eq!(arena.ref_count(atlas), Some(1));

        asset.assign_image(None, &mut arena).unwrap();
        assert!(asset.image().is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_wrong_byte_count_keeps_previous_image() {
        let mut arena = AtlasArena::new();
        let mut asset = image_asset(vec![1; 16], Size::new(4, 4), Some("IMG.PAL"));
        let first = arena.allocate_image(Size::new(4, 4), PixelFormat::Indexed8, Some(palette()));
        asset.assign_image(Some(first), &mut arena).unwrap();
        let before = asset.image().unwrap().atlas();

        // Same asset viewed as raw content needs 32 bytes, only 16 exist.
        let mut raw = image_asset(vec![1; 16], Size::new(4, 4), None);
        let candidate = arena.allocate_image(Size::new(4, 4), PixelFormat::Rgb565, None);
        let err = raw.assign_image(Some(candidate), &mut arena).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
        assert!(raw.image().is_none());

        assert_eq!(asset.image().unwrap().atlas(), before);
        // The rejected candidate's atlas was freed.
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_palette_mismatch() {
        let mut arena = AtlasArena::new();
        let mut asset = image_asset(vec![0; 4], Size::new(2, 2), Some("IMG.PAL"));
        let candidate = arena.allocate_image(Size::new(2, 2), PixelFormat::Rgb565, None);
        let err = asset.assign_image(Some(candidate), &mut arena).unwrap_err();
        assert!(matches!(
            err,
            AssetError::PaletteMismatch {
                expects_palette: true,
                ..
            }
        ));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_indexed_candidate_needs_palette() {
        let mut arena = AtlasArena::new();
        let mut asset = image_asset(vec![0; 4], Size::new(2, 2), Some("IMG.PAL"));
        let candidate = arena.allocate_image(Size::new(2, 2), PixelFormat::Indexed8, None);
        assert!(asset.assign_image(Some(candidate), &mut arena).is_err());
    }

    #[test]
    fn test_size_mismatch() {
        let mut arena = AtlasArena::new();
        let mut asset = image_asset(vec![0; 8], Size::new(2, 2), None);
        let candidate = arena.allocate_image(Size::new(4, 1), PixelFormat::Rgb565, None);
        let err = asset.assign_image(Some(candidate), &mut arena).unwrap_err();
        assert!(matches!(err, AssetError::SizeMismatch { .. }));
    }

    #[test]
    fn test_decode_palette() {
        let handle = AssetHandle::new(
            "IMG.PAL",
            AssetFile::from_bytes("mem", vec![255, 0, 0, 0, 255, 0]),
            0,
            0,
        );
        let mut asset = PaletteAsset::new(handle, false);
        let palette = asset.decode().unwrap();
        assert_eq!(palette.len(), PALETTE_SIZE);
        assert_eq!(palette.color(0), Some(Color::rgb(255, 0, 0)));
        assert_eq!(palette.color(1), Some(Color::rgb(0, 255, 0)));
        assert_eq!(palette.color(2), Some(Color::TRANSPARENT));
        assert!(asset.palette().is_some());
    }

    #[test]
    fn test_decode_palette_rejects_partial_triplet() {
        let handle = AssetHandle::new("BAD.PAL", AssetFile::from_bytes("mem", vec![1, 2]), 0, 0);
        let mut asset = PaletteAsset::new(handle, true);
        assert!(matches!(asset.decode(), Err(AssetError::Decode { .. })));
        assert!(asset.palette().is_none());
    }
}
