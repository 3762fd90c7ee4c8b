//! Container processors.
//!
//! A processor knows one container format. The registry offers every
//! container name to every processor at every search root until one of them
//! claims it, then lets each processor turn raw assets into typed ones.

use std::path::Path;

use crate::error::AssetResult;
use crate::storage::AssetStorage;

pub trait AssetProcessor {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Look for `container` under `root` and register its raw assets.
    ///
    /// Returns `Ok(false)` when this processor does not find the container
    /// there. An error means the container exists but is malformed; the
    /// registry records it and keeps trying other roots and processors.
    fn scan_container(
        &mut self,
        root: &Path,
        container: &str,
        storage: &mut AssetStorage,
    ) -> AssetResult<bool>;

    /// Merge related raw assets into typed ones. Runs once after every
    /// container has been scanned; an error aborts the load.
    fn process_intermediates(&mut self, _storage: &mut AssetStorage) -> AssetResult<()> {
        Ok(())
    }

    /// Format specific work after every refresh has packed the atlases.
    fn refresh_assets(&mut self, _storage: &mut AssetStorage) -> AssetResult<()> {
        Ok(())
    }
}

/// Join a container name and a relative entry into a logical asset path.
///
/// Logical paths are upper-case and `/` separated regardless of the host.
pub fn logical_path(container: &str, entry: &str) -> String {
    let entry = entry.replace('\\', "/");
    let entry = entry.trim_start_matches('/');
    format!("{}/{}", container, entry).to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_path() {
        assert_eq!(logical_path("data", "units\\tank.dat"), "DATA/UNITS/TANK.DAT");
        assert_eq!(logical_path("Data", "/a/b.pal"), "DATA/A/B.PAL");
    }
}
