//! Ember Render
//!
//! CPU-side graphics data for the Ember asset pipeline: colors, palettes,
//! indexed and raw images, and the texture atlases they are packed into.
//! The [`Renderer`] trait is the seam to an actual GPU backend; enable the
//! `gpu` feature for the wgpu implementation.

pub mod atlas;
pub mod color;
pub mod error;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod image;
pub mod palette;
pub mod renderer;

pub use atlas::{AtlasArena, AtlasId, AtlasView, RectPacker};
pub use color::Color;
pub use error::{RenderError, RenderResult};
#[cfg(feature = "gpu")]
pub use gpu::WgpuRenderer;
pub use image::{Image, PixelFormat};
pub use palette::{PALETTE_EXTRA_COLORS, PALETTE_SIZE, Palette};
pub use renderer::{AtlasUpload, MINIMUM_TEXTURE_SIZE, Renderer, upload_all};
