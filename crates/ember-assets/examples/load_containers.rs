//! Loads a small generated game-data set and prints what ended up where.
//!
//! This example shows:
//! - Building a directory container and a `.WD` archive
//! - Registering required and optional containers
//! - Loading headless and inspecting the packed atlases
//!
//! Run with `RUST_LOG=debug` to see the packing log.

use std::fs;

use ember_assets::{AssetConfig, AssetRegistry, ImageAsset};
use ember_core::config::Config;
use ember_test_utils::MockRenderer;
use ember_test_utils::fixtures::{ArchiveBuilder, dat_bytes, ramp_palette};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    ember_core::logging::init();

    let root = tempfile::tempdir()?;

    // A directory container with a palette/image pair.
    let units = root.path().join("DATA/UNITS");
    fs::create_dir_all(&units)?;
    fs::write(units.join("TANK.PAL"), ramp_palette(32))?;
    fs::write(units.join("TANK.DAT"), dat_bytes(24, 16, &[7; 24 * 16]))?;

    // An archive container with another pair.
    let archive = ArchiveBuilder::new()
        .entry("UI/CURSOR.PAL", ramp_palette(8))
        .entry("UI/CURSOR.DAT", dat_bytes(8, 8, &[3; 64]))
        .build();
    fs::write(root.path().join("INTERFACE.WD"), archive)?;

    let engine = Config::from_args(std::env::args().skip(1));
    if let Some(backend) = engine.benchmark.profiling_backend() {
        ember_core::profiling::init_profiling(backend);
    }
    let config = AssetConfig {
        headless: engine.headless,
        ..AssetConfig::with_root(root.path())
    };
    let mut registry = AssetRegistry::with_default_processors(config);
    registry.register_container("DATA", true);
    registry.register_container("INTERFACE", true);
    registry.register_container("EXPANSION", false);

    let mut renderer = MockRenderer::new(512);
    registry.load_assets(Some(&renderer))?;

    for path in registry.asset_paths() {
        if let Some(asset) = registry.get_asset::<ImageAsset>(path)
            && let Some(image) = asset.image()
        {
            println!(
                "{:<24} {:>7} in atlas {} at {}",
                path,
                asset.size().to_string(),
                image.atlas().index(),
                image.region()
            );
        }
    }

    let uploaded = registry.upload_atlases(&mut renderer)?;
    println!("{} atlases uploaded", uploaded);
    Ok(())
}
