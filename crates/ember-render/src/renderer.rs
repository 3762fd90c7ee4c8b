//! The narrow slice of a rendering backend the asset pipeline talks to.

use crate::atlas::{AtlasArena, AtlasId, AtlasView};
use crate::error::RenderResult;
use crate::image::PixelFormat;

/// Smallest atlas edge used when no backend is available to ask.
pub const MINIMUM_TEXTURE_SIZE: u32 = 1024;

/// One atlas ready to be handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct AtlasUpload<'a> {
    pub id: AtlasId,
    /// Edge length in pixels; atlases are square.
    pub size: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
}

impl<'a> From<AtlasView<'a>> for AtlasUpload<'a> {
    fn from(view: AtlasView<'a>) -> Self {
        Self {
            id: view.id,
            size: view.size,
            format: view.format,
            pixels: view.pixels,
        }
    }
}

/// A backend that can report its texture limits and receive atlases.
pub trait Renderer {
    /// Largest square texture edge the backend accepts.
    fn max_texture_size(&self) -> u32;

    fn upload_atlas(&mut self, upload: &AtlasUpload<'_>) -> RenderResult<()>;
}

/// Push every live atlas in `arena` to `renderer`, returning how many were sent.
pub fn upload_all(arena: &AtlasArena, renderer: &mut dyn Renderer) -> RenderResult<usize> {
    let mut count = 0;
    for view in arena.iter() {
        renderer.upload_atlas(&AtlasUpload::from(view))?;
        count += 1;
    }
    tracing::debug!("Uploaded {} atlases", count);
    Ok(count)
}
