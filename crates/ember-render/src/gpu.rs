//! wgpu-backed [`Renderer`].
//!
//! Indexed atlases are uploaded as `R8Unorm` so palette lookup can happen in a
//! shader; raw atlases are expanded to `Rgba8Unorm` on the way up.

use std::sync::Arc;

use ember_core::alloc::HashMap;
use ember_core::profiling::profile_function;

use crate::atlas::{AtlasArena, AtlasId};
use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::image::PixelFormat;
use crate::renderer::{AtlasUpload, Renderer};

struct GpuAtlas {
    texture: wgpu::Texture,
    size: u32,
    format: PixelFormat,
}

pub struct WgpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    textures: HashMap<AtlasId, GpuAtlas>,
}

impl WgpuRenderer {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::new(),
        }
    }

    /// Texture holding the given atlas, if it has been uploaded.
    pub fn texture(&self, id: AtlasId) -> Option<&wgpu::Texture> {
        self.textures.get(&id).map(|atlas| &atlas.texture)
    }

    /// Drop textures whose atlas no longer exists in `arena`.
    pub fn retain_live(&mut self, arena: &AtlasArena) {
        let before = self.textures.len();
        self.textures.retain(|id, _| arena.get(*id).is_some());
        let dropped = before - self.textures.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} stale atlas textures", dropped);
        }
    }

    fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
        match format {
            PixelFormat::Indexed8 => wgpu::TextureFormat::R8Unorm,
            PixelFormat::Rgb565 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    fn create_texture(&self, size: u32, format: PixelFormat) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Ember Atlas"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::texture_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }
}

impl Renderer for WgpuRenderer {
    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn upload_atlas(&mut self, upload: &AtlasUpload<'_>) -> RenderResult<()> {
        profile_function!();
        let expected = upload.format.buffer_len(upload.size, upload.size);
        if upload.pixels.len() != expected {
            return Err(RenderError::UploadFailed(format!(
                "atlas {:?} carries {} bytes, expected {}",
                upload.id,
                upload.pixels.len(),
                expected
            )));
        }
        if upload.size == 0 {
            return Ok(());
        }
        if upload.size > self.max_texture_size() {
            return Err(RenderError::UploadFailed(format!(
                "atlas size {} exceeds device limit {}",
                upload.size,
                self.max_texture_size()
            )));
        }

        let reuse = self
            .textures
            .get(&upload.id)
            .is_some_and(|atlas| atlas.size == upload.size && atlas.format == upload.format);
        if !reuse {
            let texture = self.create_texture(upload.size, upload.format);
            self.textures.insert(
                upload.id,
                GpuAtlas {
                    texture,
                    size: upload.size,
                    format: upload.format,
                },
            );
        }
        let Some(atlas) = self.textures.get(&upload.id) else {
            return Err(RenderError::StaleAtlas);
        };

        let converted;
        let (data, bytes_per_pixel) = match upload.format {
            PixelFormat::Indexed8 => (upload.pixels, 1),
            PixelFormat::Rgb565 => {
                converted = upload
                    .pixels
                    .chunks_exact(2)
                    .flat_map(|pair| {
                        Color::from_rgb565(u16::from_le_bytes([pair[0], pair[1]])).to_array()
                    })
                    .collect::<Vec<u8>>();
                (converted.as_slice(), 4)
            }
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &atlas.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload.size * bytes_per_pixel),
                rows_per_image: Some(upload.size),
            },
            wgpu::Extent3d {
                width: upload.size,
                height: upload.size,
                depth_or_array_layers: 1,
            },
        );
        tracing::trace!("Uploaded atlas {:?} ({:?}, {})", upload.id, upload.format, upload.size);
        Ok(())
    }
}
