//! Asset registry - the coordinator of the loading pipeline.

use std::path::PathBuf;

use ember_core::profiling::{new_frame, profile_function};
use ember_render::{AtlasArena, Image, Renderer};
use indexmap::IndexMap;

use crate::asset::{Asset, PaletteAsset};
use crate::config::AssetConfig;
use crate::error::{AssetError, AssetResult};
use crate::packing::{AtlasPacker, PackStats};
use crate::processor::AssetProcessor;
use crate::processors::{ArchiveProcessor, DatPalProcessor, DirectoryProcessor};
use crate::state::LoadState;
use crate::storage::AssetStorage;

/// Owns every asset and drives container scanning, intermediate processing
/// and atlas packing.
///
/// # Example
///
/// ```no_run
/// use ember_assets::{AssetConfig, AssetRegistry, ImageAsset};
///
/// let config = AssetConfig::default().headless(true);
/// let mut registry = AssetRegistry::with_default_processors(config);
/// registry.register_container("DATA", true);
/// registry.register_container("EXPANSION", false);
///
/// registry.load_assets(None)?;
/// if let Some(image) = registry.get_asset::<ImageAsset>("DATA/UNITS/TANK.DAT") {
///     println!("tank is {}", image.size());
/// }
/// # Ok::<(), ember_assets::AssetError>(())
/// ```
pub struct AssetRegistry {
    config: AssetConfig,
    storage: AssetStorage,
    processors: Vec<Box<dyn AssetProcessor>>,
    /// Container name to whether it is required, in load order.
    containers: IndexMap<String, bool>,
    state: LoadState,
}

impl AssetRegistry {
    /// A registry without processors.
    pub fn new(config: AssetConfig) -> Self {
        Self {
            config,
            storage: AssetStorage::new(),
            processors: Vec::new(),
            containers: IndexMap::new(),
            state: LoadState::Empty,
        }
    }

    /// A registry understanding directories, `.WD` archives and
    /// `.PAL`/`.DAT` pairs.
    pub fn with_default_processors(config: AssetConfig) -> Self {
        let mut registry = Self::new(config);
        registry.add_processor(Box::new(DirectoryProcessor::new()));
        registry.add_processor(Box::new(ArchiveProcessor::new()));
        registry.add_processor(Box::new(DatPalProcessor::new()));
        registry
    }

    /// Processors are consulted in the order they are added.
    pub fn add_processor(&mut self, processor: Box<dyn AssetProcessor>) {
        self.processors.push(processor);
    }

    pub fn register_container(&mut self, name: impl Into<String>, required: bool) {
        self.containers.insert(name.into(), required);
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Run the whole pipeline: scan every container, merge intermediates and
    /// pack atlases.
    ///
    /// `renderer` is only asked for its texture limit; it may be `None` in
    /// headless mode. On failure the registry is left empty in
    /// [`LoadState::Failed`].
    pub fn load_assets(&mut self, renderer: Option<&dyn Renderer>) -> AssetResult<()> {
        profile_function!();
        self.clear_assets();

        let result = self.scan_and_refresh(renderer);
        let result = self.finish(result).map(|_| {
            tracing::info!("Loaded {} assets", self.storage.len());
        });
        new_frame();
        result
    }

    /// Rebuild every resolved image and palette from scratch.
    pub fn refresh_assets(&mut self, renderer: Option<&dyn Renderer>) -> AssetResult<PackStats> {
        let result = self.refresh(renderer);
        let result = self.finish(result);
        new_frame();
        result
    }

    fn finish<T>(&mut self, result: AssetResult<T>) -> AssetResult<T> {
        match result {
            Ok(value) => {
                self.state = LoadState::Loaded;
                Ok(value)
            }
            Err(err) => {
                tracing::error!("Asset loading failed: {}", err);
                self.clear_assets();
                self.state = LoadState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn scan_and_refresh(&mut self, renderer: Option<&dyn Renderer>) -> AssetResult<PackStats> {
        let roots = self.config.search_roots();
        let containers: Vec<(String, bool)> = self
            .containers
            .iter()
            .map(|(name, required)| (name.clone(), *required))
            .collect();
        for (name, required) in containers {
            self.load_container(&roots, &name, required)?;
        }

        for processor in &mut self.processors {
            processor.process_intermediates(&mut self.storage)?;
        }

        self.refresh(renderer)
    }

    fn load_container(
        &mut self,
        roots: &[PathBuf],
        name: &str,
        required: bool,
    ) -> AssetResult<()> {
        profile_function!();
        tracing::debug!("Loading from '{}'", name);

        let mut errors = Vec::new();
        let mut found = false;
        'roots: for root in roots {
            for processor in &mut self.processors {
                match processor.scan_container(root, name, &mut self.storage) {
                    Ok(true) => {
                        found = true;
                        break 'roots;
                    }
                    Ok(false) => {}
                    Err(err) => errors.push(format!(
                        "{} ({}): {}",
                        processor.name(),
                        root.display(),
                        err
                    )),
                }
            }
        }

        if !found {
            if required {
                return Err(AssetError::ContainerNotFound {
                    name: name.to_string(),
                    roots: roots.to_vec(),
                    errors,
                });
            }
            tracing::warn!(
                "Optional game data '{}' is not available{}",
                name,
                errors
                    .iter()
                    .map(|e| format!("\n  {}", e))
                    .collect::<String>()
            );
        }
        Ok(())
    }

    /// Atlas edge length for the next refresh.
    pub fn texture_size(&self, renderer: Option<&dyn Renderer>) -> AssetResult<u32> {
        if self.config.headless {
            return Ok(self.config.minimum_texture_size);
        }
        renderer
            .map(|renderer| renderer.max_texture_size())
            .ok_or(AssetError::RendererUnavailable)
    }

    fn refresh(&mut self, renderer: Option<&dyn Renderer>) -> AssetResult<PackStats> {
        let texture_size = self.texture_size(renderer)?;
        let packer = AtlasPacker::new(texture_size, self.config.atlas_margin);
        let stats = packer.refresh(&mut self.storage)?;

        for processor in &mut self.processors {
            processor.refresh_assets(&mut self.storage)?;
        }
        Ok(stats)
    }

    /// Register an asset; fails if the path is taken.
    pub fn add_asset(&mut self, asset: Box<dyn Asset>) -> AssetResult<()> {
        self.storage.add_asset(asset)
    }

    /// Remove an asset; fails if the path is absent.
    pub fn remove_asset(&mut self, path: &str) -> AssetResult<Box<dyn Asset>> {
        self.storage.remove_asset(path)
    }

    pub fn get(&self, path: &str) -> Option<&dyn Asset> {
        self.storage.get(path)
    }

    /// Typed lookup. Missing assets are not an error: callers get `None`.
    pub fn get_asset<T: Asset>(&self, path: &str) -> Option<&T> {
        self.storage.get_asset(path)
    }

    pub fn get_asset_mut<T: Asset>(&mut self, path: &str) -> Option<&mut T> {
        self.storage.get_asset_mut(path)
    }

    pub fn get_image(&self, path: &str) -> Option<&Image> {
        self.storage.get_image(path)
    }

    pub fn get_palette(&self, path: &str) -> Option<&PaletteAsset> {
        self.storage.palette(path)
    }

    pub fn asset_count(&self) -> usize {
        self.storage.len()
    }

    pub fn asset_paths(&self) -> impl Iterator<Item = &str> {
        self.storage.paths()
    }

    pub fn atlases(&self) -> &AtlasArena {
        self.storage.atlases()
    }

    /// Hand every live atlas to `renderer`, returning how many were sent.
    pub fn upload_atlases(&self, renderer: &mut dyn Renderer) -> AssetResult<usize> {
        Ok(ember_render::upload_all(self.storage.atlases(), renderer)?)
    }

    pub fn storage(&self) -> &AssetStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut AssetStorage {
        &mut self.storage
    }

    /// Release every asset, palette and atlas.
    pub fn clear_assets(&mut self) {
        tracing::debug!("Clearing {} assets", self.storage.len());
        self.storage.clear();
        self.state = LoadState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_test_utils::MockRenderer;

    #[test]
    fn test_texture_size_sources() {
        let renderer = MockRenderer::new(4096);
        let registry = AssetRegistry::new(AssetConfig::default());
        assert_eq!(registry.texture_size(Some(&renderer)).unwrap(), 4096);
        assert!(matches!(
            registry.texture_size(None),
            Err(AssetError::RendererUnavailable)
        ));

        let headless = AssetRegistry::new(AssetConfig::default().headless(true));
        assert_eq!(headless.texture_size(Some(&renderer)).unwrap(), 1024);
    }

    #[test]
    fn test_load_without_containers() {
        let config = AssetConfig::default().headless(true);
        let mut registry = AssetRegistry::with_default_processors(config);
        registry.load_assets(None).unwrap();
        assert!(registry.state().is_loaded());
        assert_eq!(registry.asset_count(), 0);
    }

    #[test]
    fn test_missing_renderer_fails_load() {
        let mut registry = AssetRegistry::with_default_processors(AssetConfig::default());
        assert!(registry.load_assets(None).is_err());
        assert!(registry.state().is_failed());
    }
}
