//! Packing decoded images into shared texture atlases.
//!
//! A refresh clears every resolved image and palette, then rebuilds them:
//! raw images are packed first, palettes are decoded next, and paletted
//! images are packed last so every indexed sub-image gets its color table at
//! creation time.
//!
//! Each packing pass allocates one `T x T` atlas, takes a batch of pending
//! images from the tail of the queue and places as many as fit. Anything the
//! pass could not place waits for the next atlas. A pass that places nothing
//! is a stall and fails the refresh.

use std::sync::Arc;

use ember_core::geometry::Size;
use ember_core::profiling::{profile_function, profile_scope};
use ember_render::{AtlasId, PixelFormat, RectPacker};
use indexmap::IndexSet;

use crate::asset::ImageAsset;
use crate::error::{AssetError, AssetResult};
use crate::storage::AssetStorage;

/// Border kept free around every packed image to avoid sampling bleed.
pub const ATLAS_MARGIN: u32 = 1;

/// Area of the smallest image the batch size heuristic plans for.
const BATCH_CELL: u64 = 64 * 64;

/// Outcome of packing one or more image sets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    /// Atlases allocated.
    pub atlases: usize,
    /// Images placed.
    pub images: usize,
    /// Batch members left over for a later pass.
    pub retries: usize,
}

impl std::ops::AddAssign for PackStats {
    fn add_assign(&mut self, rhs: Self) {
        self.atlases += rhs.atlases;
        self.images += rhs.images;
        self.retries += rhs.retries;
    }
}

/// Packs image assets into square atlases of one size.
#[derive(Debug, Clone)]
pub struct AtlasPacker {
    texture_size: u32,
    batch_size: usize,
    margin: u32,
}

impl AtlasPacker {
    pub fn new(texture_size: u32, margin: u32) -> Self {
        let area = u64::from(texture_size) * u64::from(texture_size);
        let batch_size = usize::try_from(area / BATCH_CELL)
            .unwrap_or(usize::MAX)
            .max(1);
        Self {
            texture_size,
            batch_size,
            margin,
        }
    }

    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    /// Most images considered for a single atlas.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Rebuild every resolved image and palette in `storage`.
    pub fn refresh(&self, storage: &mut AssetStorage) -> AssetResult<PackStats> {
        profile_function!();
        tracing::debug!(
            "Using texture size {} batch size {}",
            self.texture_size,
            self.batch_size
        );
        storage.clear_resolved();

        let mut raw = Vec::new();
        let mut paletted = Vec::new();
        for (path, asset) in &storage.entries {
            let any: &dyn std::any::Any = &**asset;
            if let Some(image) = any.downcast_ref::<ImageAsset>() {
                if image.has_palette() {
                    paletted.push(path.clone());
                } else {
                    raw.push(path.clone());
                }
            }
        }

        tracing::debug!("Processing {} images", raw.len());
        let mut stats = self.pack(storage, raw, PixelFormat::Rgb565)?;

        // Palettes must be resolved before any paletted image is packed.
        let mut linked = IndexSet::new();
        for path in &paletted {
            if let Some(key) = storage
                .get_asset::<ImageAsset>(path)
                .and_then(ImageAsset::palette)
            {
                linked.insert(key.to_string());
            }
        }
        for key in &linked {
            let palette = storage
                .palettes
                .get_mut(key)
                .ok_or_else(|| AssetError::MissingAsset { path: key.clone() })?;
            palette.decode().map_err(|err| err.in_asset(key.as_str()))?;
        }

        tracing::debug!(
            "Processing {} palette images with {} palettes",
            paletted.len(),
            linked.len()
        );
        stats += self.pack(storage, paletted, PixelFormat::Indexed8)?;

        tracing::debug!(
            "Packed {} images into {} atlases ({} retries)",
            stats.images,
            stats.atlases,
            stats.retries
        );
        Ok(stats)
    }

    /// Pack the image assets at `pending` into atlases of `format`.
    pub fn pack(
        &self,
        storage: &mut AssetStorage,
        mut pending: Vec<String>,
        format: PixelFormat,
    ) -> AssetResult<PackStats> {
        profile_function!();
        let mut stats = PackStats::default();

        while !pending.is_empty() {
            let batch_start = pending.len().saturating_sub(self.batch_size);
            let requests = self.batch_requests(storage, &pending[batch_start..])?;

            let atlas = storage.atlases.allocate(self.texture_size, format);
            stats.atlases += 1;
            let placed =
                self.place_batch(storage, &mut pending, batch_start, &requests, format, atlas);
            storage.atlases.unpin(atlas);
            let placed = placed?;

            stats.images += placed;
            stats.retries += requests.len() - placed;
            tracing::debug!(
                "Atlas {} contains {} images, {} pending",
                stats.atlases - 1,
                placed,
                pending.len()
            );
            if placed == 0 {
                return Err(AssetError::PackingStalled {
                    remaining: pending.len(),
                });
            }
        }
        Ok(stats)
    }

    /// Margin-expanded rectangle requests for a batch, validated against the
    /// atlas size before anything is allocated.
    fn batch_requests(
        &self,
        storage: &AssetStorage,
        batch: &[String],
    ) -> AssetResult<Vec<Size<u32>>> {
        let limit = i64::from(self.texture_size);
        let border = 2 * i64::from(self.margin);
        batch
            .iter()
            .map(|path| {
                let image = storage
                    .get_asset::<ImageAsset>(path)
                    .ok_or_else(|| AssetError::MissingAsset { path: path.clone() })?;
                let size = image.size();
                if size.width < 0 || size.height < 0 {
                    return Err(AssetError::NegativeSize {
                        path: path.clone(),
                        size,
                    });
                }
                let width = i64::from(size.width) + border;
                let height = i64::from(size.height) + border;
                if width > limit || height > limit {
                    return Err(AssetError::ImageTooLarge {
                        path: path.clone(),
                        size,
                        max: self.texture_size,
                    });
                }
                Ok(Size::new(width as u32, height as u32))
            })
            .collect()
    }

    /// Place one batch into `atlas`, binding each placed image. Returns the
    /// number placed; placed images are removed from `pending`.
    fn place_batch(
        &self,
        storage: &mut AssetStorage,
        pending: &mut Vec<String>,
        batch_start: usize,
        requests: &[Size<u32>],
        format: PixelFormat,
        atlas: AtlasId,
    ) -> AssetResult<usize> {
        profile_scope!("place_batch");
        let placements = RectPacker::new(self.texture_size).pack(requests);

        let mut placed = 0;
        // Descending so removals leave lower indices valid.
        for (offset, rect) in placements.iter().enumerate().rev() {
            let Some(rect) = rect else {
                continue;
            };
            let Some(region) = rect.shrink(self.margin) else {
                continue;
            };
            let path = pending.remove(batch_start + offset);

            let palette = match format {
                PixelFormat::Indexed8 => storage
                    .get_asset::<ImageAsset>(&path)
                    .and_then(ImageAsset::palette)
                    .and_then(|key| storage.palettes.get(key))
                    .and_then(|palette| palette.palette().map(Arc::clone)),
                PixelFormat::Rgb565 => None,
            };

            let AssetStorage {
                entries, atlases, ..
            } = &mut *storage;
            let image = atlases.sub_image(atlas, region, palette)?;
            let Some(asset) = entries.get_mut(&path) else {
                atlases.release(image);
                return Err(AssetError::MissingAsset { path });
            };
            let any: &mut dyn std::any::Any = &mut **asset;
            let Some(asset) = any.downcast_mut::<ImageAsset>() else {
                atlases.release(image);
                return Err(AssetError::MissingAsset { path });
            };
            asset
                .assign_image(Some(image), atlases)
                .map_err(|err| err.in_asset(path.as_str()))?;
            placed += 1;
        }
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::PaletteAsset;
    use crate::file::AssetFile;
    use crate::handle::AssetHandle;
    use ember_core::geometry::Rect;

    fn add_raw_image(storage: &mut AssetStorage, path: &str, width: i32, height: i32) {
        let len = (width.max(0) * height.max(0) * 2) as usize;
        let file = AssetFile::from_bytes(path, vec![0x5A; len]);
        let handle = AssetHandle::new(path, file, 0, len as u64);
        let image = ImageAsset::new(handle, Size::new(width, height), None);
        storage.add_asset(Box::new(image)).unwrap();
    }

    fn regions(storage: &AssetStorage) -> Vec<(AtlasId, Rect<u32>)> {
        storage
            .paths()
            .filter_map(|path| storage.get_image(path))
            .map(|image| (image.atlas(), image.region()))
            .collect()
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(AtlasPacker::new(1024, 1).batch_size(), 256);
        assert_eq!(AtlasPacker::new(256, 1).batch_size(), 16);
        assert_eq!(AtlasPacker::new(32, 1).batch_size(), 1);
    }

    #[test]
    fn test_two_images_share_one_atlas() {
        let mut storage = AssetStorage::new();
        add_raw_image(&mut storage, "A.RAW", 100, 100);
        add_raw_image(&mut storage, "B.RAW", 100, 100);

        let stats = AtlasPacker::new(256, ATLAS_MARGIN).refresh(&mut storage).unwrap();
        assert_eq!(stats.atlases, 1);
        assert_eq!(stats.images, 2);
        assert_eq!(storage.atlases().len(), 1);

        let placed = regions(&storage);
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].0, placed[1].0);
        assert!(!placed[0].1.intersects(&placed[1].1));
        let bounds = Rect::new(0, 0, 256, 256);
        assert!(placed.iter().all(|(_, r)| bounds.contains_rect(r)));
    }

    #[test]
    fn test_overflow_spills_into_second_atlas() {
        let mut storage = AssetStorage::new();
        for i in 0..5 {
            add_raw_image(&mut storage, &format!("IMG{}.RAW", i), 100, 100);
        }
        let stats = AtlasPacker::new(256, ATLAS_MARGIN).refresh(&mut storage).unwrap();
        // Four 102x102 cells fit a 256 atlas, the fifth needs another.
        assert_eq!(stats.atlases, 2);
        assert_eq!(stats.images, 5);
        assert_eq!(storage.atlases().len(), 2);

        let placed = regions(&storage);
        for (i, (atlas_a, a)) in placed.iter().enumerate() {
            for (atlas_b, b) in &placed[i + 1..] {
                assert!(atlas_a != atlas_b || !a.intersects(b));
            }
        }
    }

    #[test]
    fn test_too_large_is_rejected_before_allocation() {
        let mut storage = AssetStorage::new();
        add_raw_image(&mut storage, "HUGE.RAW", 300, 10);
        let err = AtlasPacker::new(256, ATLAS_MARGIN)
            .refresh(&mut storage)
            .unwrap_err();
        match err {
            AssetError::ImageTooLarge { path, .. } => assert_eq!(path, "HUGE.RAW"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(storage.atlases().is_empty());
    }

    #[test]
    fn test_margin_counts_against_limit() {
        let mut storage = AssetStorage::new();
        add_raw_image(&mut storage, "EDGE.RAW", 255, 255);
        assert!(matches!(
            AtlasPacker::new(256, 1).refresh(&mut storage),
            Err(AssetError::ImageTooLarge { .. })
        ));

        let mut storage = AssetStorage::new();
        add_raw_image(&mut storage, "EDGE.RAW", 254, 254);
        AtlasPacker::new(256, 1).refresh(&mut storage).unwrap();
        assert_eq!(
            storage.get_image("EDGE.RAW").unwrap().region(),
            Rect::new(1, 1, 254, 254)
        );
    }

    #[test]
    fn test_negative_size() {
        let mut storage = AssetStorage::new();
        add_raw_image(&mut storage, "NEG.RAW", -1, 4);
        assert!(matches!(
            AtlasPacker::new(256, 1).refresh(&mut storage),
            Err(AssetError::NegativeSize { .. })
        ));
    }

    #[test]
    fn test_paletted_images_get_resolved_palette() {
        let mut storage = AssetStorage::new();
        let pal = AssetFile::from_bytes("pal", vec![9u8; 30]);
        storage
            .add_palette(PaletteAsset::new(AssetHandle::new("X.PAL", pal, 0, 0), false))
            .unwrap();
        for name in ["X1.DAT", "X2.DAT"] {
            let file = AssetFile::from_bytes(name, vec![3u8; 16]);
            let image = ImageAsset::new(
                AssetHandle::new(name, file, 0, 0),
                Size::new(4, 4),
                Some("X.PAL".into()),
            );
            storage.add_asset(Box::new(image)).unwrap();
        }

        AtlasPacker::new(64, 1).refresh(&mut storage).unwrap();
        let resolved = storage.palette("X.PAL").unwrap().palette().unwrap().clone();
        for name in ["X1.DAT", "X2.DAT"] {
            let image = storage.get_image(name).unwrap();
            assert_eq!(image.format(), PixelFormat::Indexed8);
            assert!(Arc::ptr_eq(image.palette().unwrap(), &resolved));
        }
    }

    #[test]
    fn test_refresh_replaces_previous_atlases() {
        let mut storage = AssetStorage::new();
        add_raw_image(&mut storage, "A.RAW", 10, 10);
        let packer = AtlasPacker::new(64, 1);
        packer.refresh(&mut storage).unwrap();
        let first = storage.get_image("A.RAW").unwrap().atlas();

        packer.refresh(&mut storage).unwrap();
        assert_eq!(storage.atlases().len(), 1);
        assert!(storage.atlases().get(first).is_none());
    }
}
