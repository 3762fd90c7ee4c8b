//! Palette/image record pairs.
//!
//! A palette `P.PAL` comes with an image `P.DAT`. The image record starts
//! with a little-endian `u16` width and `u16` height and two reserved bytes,
//! followed by one palette index per pixel up to the end of the record.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use ember_core::geometry::Size;
use ember_core::profiling::profile_function;

use crate::asset::{Asset, ImageAsset, PaletteAsset, RawAsset};
use crate::error::{AssetError, AssetResult};
use crate::processor::AssetProcessor;
use crate::storage::AssetStorage;

pub const PALETTE_EXTENSION: &str = ".PAL";
pub const IMAGE_EXTENSION: &str = ".DAT";

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct ImageHeader {
    width: u16,
    height: u16,
    reserved: [u8; 2],
}

const HEADER_LEN: u64 = std::mem::size_of::<ImageHeader>() as u64;

/// Turns `.PAL`/`.DAT` raw asset pairs into a palette plus an indexed image.
#[derive(Debug, Default)]
pub struct DatPalProcessor {
    /// Allocate the extra color slots on every palette.
    extra_colors: bool,
}

impl DatPalProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_colors(extra_colors: bool) -> Self {
        Self { extra_colors }
    }

    fn merge_pair(&self, storage: &mut AssetStorage, palette_path: &str) -> AssetResult<()> {
        let stem = &palette_path[..palette_path.len() - PALETTE_EXTENSION.len()];
        let image_path = format!("{}{}", stem, IMAGE_EXTENSION);

        let Some(record) = storage.get_asset_mut::<RawAsset>(&image_path) else {
            return Err(AssetError::MissingCounterpart {
                path: palette_path.to_string(),
                counterpart: image_path,
            });
        };
        let handle = record.handle_mut();
        handle.seek(0, true)?;
        let header: ImageHeader = handle.read_pod().map_err(|err| {
            AssetError::decode(&image_path, format!("error reading image size: {}", err))
        })?;
        let size = Size::new(
            i32::from(u16::from_le(header.width)),
            i32::from(u16::from_le(header.height)),
        );
        let pixels_len = handle.size()? - HEADER_LEN;
        let pixels = handle.slice(image_path.clone(), HEADER_LEN, pixels_len)?;

        let palette = storage.take_raw(palette_path)?.into_handle();
        storage.take_raw(&image_path)?;

        storage.add_palette(PaletteAsset::new(palette, self.extra_colors))?;
        storage.add_asset(Box::new(ImageAsset::new(
            pixels,
            size,
            Some(palette_path.to_string()),
        )))?;
        tracing::trace!("Merged {} with {} ({})", image_path, palette_path, size);
        Ok(())
    }
}

impl AssetProcessor for DatPalProcessor {
    fn name(&self) -> &str {
        "datpal"
    }

    fn scan_container(
        &mut self,
        _root: &Path,
        _container: &str,
        _storage: &mut AssetStorage,
    ) -> AssetResult<bool> {
        Ok(false)
    }

    fn process_intermediates(&mut self, storage: &mut AssetStorage) -> AssetResult<()> {
        profile_function!();
        let palettes: Vec<String> = storage
            .paths()
            .filter(|path| path.ends_with(PALETTE_EXTENSION))
            .filter(|path| storage.get_asset::<RawAsset>(path).is_some())
            .map(String::from)
            .collect();

        for palette_path in &palettes {
            self.merge_pair(storage, palette_path)?;
        }
        if !palettes.is_empty() {
            tracing::debug!("Merged {} palette/image pairs", palettes.len());
        }
        Ok(())
    }
}
