//! Ownership of every registered asset and the atlases backing their images.

use std::any::Any;

use ember_render::{AtlasArena, Image};
use indexmap::IndexMap;

use crate::asset::{Asset, ImageAsset, PaletteAsset, RawAsset};
use crate::error::{AssetError, AssetResult};

/// Assets keyed by logical path, in registration order.
///
/// Palettes live in their own table: they are shared by every image that
/// links them and are looked up by path during refresh rather than through
/// the general entry map.
#[derive(Default)]
pub struct AssetStorage {
    pub(crate) entries: IndexMap<String, Box<dyn Asset>>,
    pub(crate) palettes: IndexMap<String, PaletteAsset>,
    pub(crate) atlases: AtlasArena,
}

impl AssetStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under its own path.
    ///
    /// Fails without touching the existing entry if the path is taken.
    pub fn add_asset(&mut self, asset: Box<dyn Asset>) -> AssetResult<()> {
        let path = asset.path().to_string();
        if self.entries.contains_key(&path) {
            return Err(AssetError::DuplicateAsset { path });
        }
        self.entries.insert(path, asset);
        Ok(())
    }

    /// Remove an asset, releasing its decoded image.
    pub fn remove_asset(&mut self, path: &str) -> AssetResult<Box<dyn Asset>> {
        let mut asset = self
            .entries
            .shift_remove(path)
            .ok_or_else(|| AssetError::MissingAsset {
                path: path.to_string(),
            })?;
        let any: &mut dyn Any = &mut *asset;
        if let Some(image) = any.downcast_mut::<ImageAsset>() {
            image.clear_image(&mut self.atlases);
        }
        Ok(asset)
    }

    /// Remove a raw asset and hand it back by value.
    ///
    /// Fails with `MissingAsset` if the path is absent or holds another kind,
    /// leaving the storage unchanged.
    pub fn take_raw(&mut self, path: &str) -> AssetResult<RawAsset> {
        if self.get_asset::<RawAsset>(path).is_none() {
            return Err(AssetError::MissingAsset {
                path: path.to_string(),
            });
        }
        let asset = self.remove_asset(path)?;
        let any: Box<dyn Any> = asset;
        any.downcast::<RawAsset>()
            .map(|raw| *raw)
            .map_err(|_| AssetError::MissingAsset {
                path: path.to_string(),
            })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Untyped view of an asset.
    pub fn get(&self, path: &str) -> Option<&dyn Asset> {
        self.entries.get(path).map(|asset| &**asset)
    }

    /// Typed lookup. A missing path and a different kind both yield `None`.
    pub fn get_asset<T: Asset>(&self, path: &str) -> Option<&T> {
        let asset = self.entries.get(path)?;
        let any: &dyn Any = &**asset;
        any.downcast_ref::<T>()
    }

    pub fn get_asset_mut<T: Asset>(&mut self, path: &str) -> Option<&mut T> {
        let asset = self.entries.get_mut(path)?;
        let any: &mut dyn Any = &mut **asset;
        any.downcast_mut::<T>()
    }

    /// Resolved image of an image asset.
    pub fn get_image(&self, path: &str) -> Option<&Image> {
        self.get_asset::<ImageAsset>(path)?.image()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn add_palette(&mut self, palette: PaletteAsset) -> AssetResult<()> {
        let path = palette.path().to_string();
        if self.palettes.contains_key(&path) {
            return Err(AssetError::DuplicateAsset { path });
        }
        self.palettes.insert(path, palette);
        Ok(())
    }

    pub fn palette(&self, path: &str) -> Option<&PaletteAsset> {
        self.palettes.get(path)
    }

    pub fn palette_count(&self) -> usize {
        self.palettes.len()
    }

    pub fn atlases(&self) -> &AtlasArena {
        &self.atlases
    }

    /// Drop every resolved image and palette, keeping the assets themselves.
    pub fn clear_resolved(&mut self) {
        for asset in self.entries.values_mut() {
            let any: &mut dyn Any = &mut **asset;
            if let Some(image) = any.downcast_mut::<ImageAsset>() {
                image.clear_image(&mut self.atlases);
            }
        }
        for palette in self.palettes.values_mut() {
            palette.assign_palette(None);
        }
    }

    /// Drop everything, atlases included.
    pub fn clear(&mut self) {
        self.clear_resolved();
        self.entries.clear();
        self.palettes.clear();
        self.atlases.clear();
    }
}
