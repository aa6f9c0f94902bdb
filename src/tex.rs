//! Utilities for handling textures in GPU memory

use std::num::NonZeroU32;

use crate::footprint::Rect;

/// A [`wgpu::Texture`] which keeps a record of its dimensions and format, neither of which wgpu
/// will tell us after creation.
#[derive(Debug)]
pub struct SizedTexture {
    tex: wgpu::Texture,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
}

impl SizedTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: wgpu::Extent3d,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
        });
        Self { tex, size, format }
    }

    /// Copy an image from CPU memory into a new texture which shaders can sample from
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        source: &image::RgbaImage,
    ) -> Self {
        let (width, height) = source.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1, // Not using 3D textures
        };
        let texture = Self::new(
            device,
            label,
            size,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture.tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            source,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: NonZeroU32::new(4 * width),
                rows_per_image: NonZeroU32::new(height),
            },
            size,
        );
        texture
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> wgpu::Extent3d {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// The pixels covered by this texture, with the top-left pixel at the origin
    pub fn bounds(&self) -> Rect {
        Rect::from_origin(self.width() as i32, self.height() as i32)
    }

    /// Returns `true` if this texture is at least as large as `size` in every dimension
    pub fn fits(&self, size: wgpu::Extent3d) -> bool {
        size.width <= self.size.width
            && size.height <= self.size.height
            && size.depth_or_array_layers <= self.size.depth_or_array_layers
    }

    pub fn view(&self) -> wgpu::TextureView {
        self.tex.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn tex(&self) -> &wgpu::Texture {
        &self.tex
    }
}

impl std::ops::Deref for SizedTexture {
    type Target = wgpu::Texture;

    fn deref(&self) -> &Self::Target {
        &self.tex
    }
}
