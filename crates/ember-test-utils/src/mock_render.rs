//! Mock [`Renderer`] for testing.
//!
//! Records every atlas upload without touching a GPU.

use ember_render::{AtlasId, AtlasUpload, PixelFormat, RenderError, RenderResult, Renderer};
use parking_lot::Mutex;

/// Records a renderer call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    MaxTextureSize,
    UploadAtlas {
        id: AtlasId,
        size: u32,
        format: PixelFormat,
        bytes: usize,
    },
}

/// Mock implementation of [`Renderer`].
///
/// `max_texture_size` takes `&self` but still has to be recorded, so calls
/// live behind a `Mutex`.
///
/// # Example
///
/// ```rust
/// use ember_render::{AtlasArena, AtlasUpload, PixelFormat, Renderer};
/// use ember_test_utils::MockRenderer;
///
/// let mut arena = AtlasArena::new();
/// let atlas = arena.allocate(32, PixelFormat::Indexed8);
///
/// let mut mock = MockRenderer::new(32);
/// let view = arena.get(atlas).unwrap();
/// mock.upload_atlas(&AtlasUpload::from(view)).unwrap();
///
/// assert_eq!(mock.upload_count(), 1);
/// assert_eq!(mock.uploaded_formats(), vec![PixelFormat::Indexed8]);
/// ```
pub struct MockRenderer {
    max_texture_size: u32,
    /// Fail every upload, to exercise error paths.
    fail_uploads: bool,
    calls: Mutex<Vec<RenderCall>>,
}

impl MockRenderer {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            fail_uploads: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A renderer whose uploads always fail.
    pub fn failing(max_texture_size: u32) -> Self {
        Self {
            fail_uploads: true,
            ..Self::new(max_texture_size)
        }
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RenderCall::UploadAtlas { .. }))
            .count()
    }

    /// Formats of every uploaded atlas, in upload order.
    pub fn uploaded_formats(&self) -> Vec<PixelFormat> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RenderCall::UploadAtlas { format, .. } => Some(*format),
                _ => None,
            })
            .collect()
    }

    /// Number of times the texture limit was queried.
    pub fn size_queries(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, RenderCall::MaxTextureSize))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new(ember_render::MINIMUM_TEXTURE_SIZE)
    }
}

impl Renderer for MockRenderer {
    fn max_texture_size(&self) -> u32 {
        self.calls.lock().push(RenderCall::MaxTextureSize);
        self.max_texture_size
    }

    fn upload_atlas(&mut self, upload: &AtlasUpload<'_>) -> RenderResult<()> {
        if self.fail_uploads {
            return Err(RenderError::UploadFailed("mock renderer rejects uploads".into()));
        }
        self.calls.lock().push(RenderCall::UploadAtlas {
            id: upload.id,
            size: upload.size,
            format: upload.format,
            bytes: upload.pixels.len(),
        });
        Ok(())
    }
}
