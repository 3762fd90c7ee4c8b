//! Ember Assets
//!
//! Loads game data containers, decodes the images and palettes inside them
//! and packs every image into shared texture atlases.
//!
//! The pipeline is driven by [`AssetRegistry::load_assets`]:
//!
//! 1. every registered container is offered to every [`AssetProcessor`] at
//!    every search root until one claims it, registering [`RawAsset`]s;
//! 2. processors merge raw assets into typed ones, e.g. `.PAL`/`.DAT` pairs
//!    into a [`PaletteAsset`] and an indexed [`ImageAsset`];
//! 3. [`AtlasPacker::refresh`] packs raw images, decodes palettes and then
//!    packs paletted images into atlases owned by the storage.
//!
//! Lookups never fail: a missing path or a different asset kind yields `None`.

pub mod asset;
pub mod config;
pub mod error;
pub mod file;
pub mod handle;
pub mod packing;
pub mod processor;
pub mod processors;
pub mod registry;
pub mod state;
pub mod storage;

pub use asset::{Asset, ImageAsset, PaletteAsset, RawAsset};
pub use config::AssetConfig;
pub use error::{AssetError, AssetResult};
pub use file::AssetFile;
pub use handle::AssetHandle;
pub use packing::{ATLAS_MARGIN, AtlasPacker, PackStats};
pub use processor::AssetProcessor;
pub use processors::{ArchiveProcessor, DatPalProcessor, DirectoryProcessor};
pub use registry::AssetRegistry;
pub use state::LoadState;
pub use storage::AssetStorage;
