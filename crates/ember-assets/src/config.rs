//! Asset pipeline configuration.

use std::path::{Path, PathBuf};

use ember_core::config::Config;
use ember_render::MINIMUM_TEXTURE_SIZE;

use crate::packing::ATLAS_MARGIN;

/// Environment variable naming an extra install location searched first.
pub const ASSETS_ROOT_ENV: &str = "EMBER_ASSETS_ROOT";

/// Where containers are searched for and how atlases are sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    /// Directory holding the containers, relative to every root.
    pub assets_dir: PathBuf,
    /// Candidate install/override locations in priority order. Empty means
    /// the defaults from [`AssetConfig::search_roots`].
    pub roots: Vec<PathBuf>,
    /// Skip the renderer and use `minimum_texture_size`.
    pub headless: bool,
    pub minimum_texture_size: u32,
    pub atlas_margin: u32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            roots: Vec::new(),
            headless: false,
            minimum_texture_size: MINIMUM_TEXTURE_SIZE,
            atlas_margin: ATLAS_MARGIN,
        }
    }
}

impl AssetConfig {
    /// Defaults with the engine's headless flag applied.
    pub fn from_engine(config: &Config) -> Self {
        Self {
            headless: config.headless,
            ..Self::default()
        }
    }

    /// Search `root` only, with containers directly inside it.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: PathBuf::new(),
            roots: vec![root.into()],
            ..Self::default()
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Every directory a container may live in, in priority order.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let bases = if self.roots.is_empty() {
            default_roots()
        } else {
            self.roots.clone()
        };

        let mut roots: Vec<PathBuf> = Vec::with_capacity(bases.len());
        for base in bases {
            let root = join_assets_dir(&base, &self.assets_dir);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }
}

fn join_assets_dir(base: &Path, assets_dir: &Path) -> PathBuf {
    if assets_dir.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(assets_dir)
    }
}

fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(root) = std::env::var_os(ASSETS_ROOT_ENV) {
        roots.push(PathBuf::from(root));
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(dir);
    }
    if let Ok(dir) = std::env::current_dir() {
        roots.push(dir);
    }
    roots
}
