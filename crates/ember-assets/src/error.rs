//! Error types for the asset pipeline.

use std::fmt;
use std::path::PathBuf;

use ember_core::geometry::Size;
use ember_render::RenderError;

/// Errors that can occur while scanning, decoding or packing assets.
#[derive(Debug)]
pub enum AssetError {
    /// Failed to read from the backing file.
    Io {
        /// The file that failed, empty when unknown.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The handle faulted earlier and refuses further work.
    Poisoned {
        /// Logical path of the handle.
        path: String,
    },

    /// A seek target lies outside the handle's window.
    SeekOutOfWindow {
        /// Requested position relative to the window start.
        requested: i64,
        /// Window length.
        len: u64,
    },

    /// Fewer bytes were available than an exact read asked for.
    ShortRead {
        /// Logical path of the handle.
        path: String,
        /// Bytes requested.
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// Malformed bytes in a container or record.
    Decode {
        /// What was being decoded.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// An asset with this logical path is already registered.
    DuplicateAsset {
        path: String,
    },

    /// No asset with this logical path is registered.
    MissingAsset {
        path: String,
    },

    /// A paired record lacks its counterpart.
    MissingCounterpart {
        /// The record that was found.
        path: String,
        /// The record that was expected next to it.
        counterpart: String,
    },

    /// An image's palette link disagrees with the image it is given.
    PaletteMismatch {
        path: String,
        /// Whether the asset declares a palette.
        expects_palette: bool,
    },

    /// An image's dimensions disagree with the image it is given.
    SizeMismatch {
        path: String,
        expected: Size<i32>,
        actual: Size<u32>,
    },

    /// A required container was not found under any root.
    ContainerNotFound {
        name: String,
        /// Every root that was searched, in priority order.
        roots: Vec<PathBuf>,
        /// Errors reported by processors while searching.
        errors: Vec<String>,
    },

    /// An image declares a negative dimension.
    NegativeSize {
        path: String,
        size: Size<i32>,
    },

    /// An image, margin included, does not fit into an atlas.
    ImageTooLarge {
        path: String,
        size: Size<i32>,
        max: u32,
    },

    /// A packing pass placed nothing.
    PackingStalled {
        /// Images still waiting for an atlas.
        remaining: usize,
    },

    /// No renderer was supplied and headless mode is off.
    RendererUnavailable,

    /// Atlas or image operation failed.
    Render(RenderError),

    /// An error tied to a specific asset.
    Context {
        path: String,
        source: Box<AssetError>,
    },
}

impl AssetError {
    /// Attach the logical path of the asset being processed.
    pub fn in_asset(self, path: impl Into<String>) -> Self {
        AssetError::Context {
            path: path.into(),
            source: Box::new(self),
        }
    }

    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The innermost error, skipping any [`AssetError::Context`] layers.
    pub fn root_cause(&self) -> &AssetError {
        match self {
            AssetError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Io { path, source } => {
                if path.as_os_str().is_empty() {
                    write!(f, "IO error: {}", source)
                } else {
                    write!(f, "IO error reading '{}': {}", path.display(), source)
                }
            }
            AssetError::Poisoned { path } => {
                write!(f, "Asset '{}' failed earlier and is unusable", path)
            }
            AssetError::SeekOutOfWindow { requested, len } => {
                write!(f, "Seek to {} outside of asset window of {} bytes", requested, len)
            }
            AssetError::ShortRead {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Short read from '{}': expected {} bytes, got {}",
                    path, expected, actual
                )
            }
            AssetError::Decode { path, message } => {
                write!(f, "Failed to decode '{}': {}", path, message)
            }
            AssetError::DuplicateAsset { path } => {
                write!(f, "Asset already exists: {}", path)
            }
            AssetError::MissingAsset { path } => {
                write!(f, "Asset doesn't exist: {}", path)
            }
            AssetError::MissingCounterpart { path, counterpart } => {
                write!(f, "{} doesn't have counterpart {}", path, counterpart)
            }
            AssetError::PaletteMismatch {
                path,
                expects_palette,
            } => {
                if *expects_palette {
                    write!(f, "Asset '{}' uses a palette but the image is not indexed", path)
                } else {
                    write!(f, "Asset '{}' has no palette but the image is indexed", path)
                }
            }
            AssetError::SizeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Asset '{}' is {} but the image is {}",
                    path, expected, actual
                )
            }
            AssetError::ContainerNotFound { name, roots, errors } => {
                write!(f, "Required container '{}' not found in:", name)?;
                for root in roots {
                    write!(f, "\n  {}", root.display())?;
                }
                for error in errors {
                    write!(f, "\n  error: {}", error)?;
                }
                Ok(())
            }
            AssetError::NegativeSize { path, size } => {
                write!(f, "Asset image has negative size {} {}", path, size)
            }
            AssetError::ImageTooLarge { path, size, max } => {
                write!(
                    f,
                    "This asset image size exceeds the maximum texture size allowed {} {} (max {})",
                    path, size, max
                )
            }
            AssetError::PackingStalled { remaining } => {
                write!(f, "Packing failed for {} assets", remaining)
            }
            AssetError::RendererUnavailable => {
                write!(f, "No renderer available to query the texture size")
            }
            AssetError::Render(err) => write!(f, "{}", err),
            AssetError::Context { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            AssetError::Render(err) => Some(err),
            AssetError::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<RenderError> for AssetError {
    fn from(err: RenderError) -> Self {
        AssetError::Render(err)
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_skips_context() {
        let err = AssetError::PackingStalled { remaining: 3 }.in_asset("A/B.DAT");
        assert!(matches!(err.root_cause(), AssetError::PackingStalled { remaining: 3 }));
        assert_eq!(err.to_string(), "A/B.DAT: Packing failed for 3 assets");
    }

    #[test]
    fn test_container_not_found_lists_roots() {
        let err = AssetError::ContainerNotFound {
            name: "MAIN".into(),
            roots: vec![PathBuf::from("/opt/game/assets"), PathBuf::from("assets")],
            errors: vec![],
        };
        let text = err.to_string();
        assert!(text.contains("/opt/game/assets"));
        assert!(text.contains("\n  assets"));
    }
}
