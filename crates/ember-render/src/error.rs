//! Error types for images, palettes and atlases.

use std::fmt;

use ember_core::geometry::Rect;

use crate::image::PixelFormat;

/// Errors raised by the CPU-side graphics types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The atlas was released or never existed.
    StaleAtlas,
    /// A sub-image region does not fit inside its atlas.
    RegionOutOfBounds {
        region: Rect<u32>,
        atlas_size: u32,
    },
    /// Pixel data length does not match the image size and format.
    PixelCountMismatch {
        expected: usize,
        actual: usize,
        format: PixelFormat,
    },
    /// The operation needs a different pixel format.
    FormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },
    /// An indexed image has no palette bound.
    MissingPalette,
    /// Palette index outside the color table.
    PaletteIndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// The renderer rejected an upload.
    UploadFailed(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleAtlas => write!(f, "Atlas is no longer alive"),
            Self::RegionOutOfBounds { region, atlas_size } => {
                write!(f, "Region {} exceeds atlas of size {}", region, atlas_size)
            }
            Self::PixelCountMismatch {
                expected,
                actual,
                format,
            } => write!(
                f,
                "Pixel data has {} bytes but {} were expected for {:?}",
                actual, expected, format
            ),
            Self::FormatMismatch { expected, actual } => {
                write!(f, "Expected {:?} image but got {:?}", expected, actual)
            }
            Self::MissingPalette => write!(f, "Indexed image has no palette"),
            Self::PaletteIndexOutOfRange { index, len } => {
                write!(f, "Palette index {} out of range for {} colors", index, len)
            }
            Self::UploadFailed(msg) => write!(f, "Atlas upload failed: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

/// Result type alias for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
