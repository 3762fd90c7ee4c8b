//! Registry load state.

/// Outcome of the most recent [`AssetRegistry::load_assets`](crate::AssetRegistry::load_assets).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing has been loaded, or the registry was cleared.
    #[default]
    Empty,

    /// Every container was scanned and every image packed.
    Loaded,

    /// The load stopped; the registry holds no assets.
    Failed(String),
}

impl LoadState {
    /// Returns `true` if the last load succeeded.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    /// Returns `true` if the last load failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }

    /// The failure message, if the last load failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }
}
