//! [`Surface`] implementation which runs the CRT shader with wgpu.

use std::{num::NonZeroU32, path::Path, sync::Arc};

use log::{debug, trace};
use wgpu::util::DeviceExt;

use crate::{
    error::{CrtError, CrtResult},
    footprint::Rect,
    surface::{Footprint, Surface},
    tex::SizedTexture,
    types::CONSTANTS_SIZE,
};

/// Handles to the GPU, shared by every effect instance which renders on that GPU
pub struct WgpuSurface {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    /// Format of every output texture
    format: wgpu::TextureFormat,
}

impl WgpuSurface {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            format,
        }
    }

    /// Requests the default adapter and a device with no surface attached, rendering into
    /// `Rgba8UnormSrgb` textures
    pub fn headless() -> CrtResult<Self> {
        let instance = wgpu::Instance::new(wgpu::Backends::all());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok_or_else(|| CrtError::surface("no suitable GPU adapter"))?;
        debug!("Using adapter {:?}", adapter.get_info());
        let (device, queue) = pollster::block_on(adapter.request_device(&Default::default(), None))
            .map_err(CrtError::surface)?;
        Ok(Self::new(
            Arc::new(device),
            Arc::new(queue),
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    ////////////
    // IMAGES //
    ////////////

    /// Load an image into GPU memory, ready to be bound as an effect's input
    pub fn upload_image(
        &self,
        label: &str,
        source: &image::RgbaImage,
    ) -> CrtResult<Arc<SizedTexture>> {
        let (width, height) = source.dimensions();
        self.check_texture_size(width, height)?;
        self.validated(&format!("uploading {}", label), || {
            Arc::new(SizedTexture::from_image(
                &self.device,
                &self.queue,
                label,
                source,
            ))
        })
    }

    /// Decode an image file and load it into GPU memory
    pub fn load_image(&self, path: impl AsRef<Path>) -> CrtResult<Arc<SizedTexture>> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let rgba_image = image::io::Reader::open(path)
            .map_err(|e| CrtError::resource_load(&name, e))?
            .decode()
            .map_err(|e| CrtError::resource_load(&name, e))?
            .into_rgba8();
        self.upload_image(&name, &rgba_image)
    }

    /// Fails if the device can't hold a 2D texture of the given size
    fn check_texture_size(&self, width: u32, height: u32) -> CrtResult<()> {
        fits_texture_limit(width, height, self.device.limits().max_texture_dimension_2d)
    }

    /// Copy the most recently rendered region of `output` back into CPU memory
    pub fn read_output(&self, output: &WgpuOutput) -> CrtResult<image::RgbaImage> {
        let pixel_size = std::mem::size_of::<u32>() as u32;
        let (width, height) = (output.region.width(), output.region.height());
        if width == 0 || height == 0 {
            return Ok(image::RgbaImage::new(width, height));
        }
        let padded_row = padded_bytes_per_row(width);

        // Create a buffer into which we can copy our texture
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output readback buffer"),
            size: (padded_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        // Copy the texture into the buffer
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Output readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                aspect: wgpu::TextureAspect::All,
                texture: output.texture.tex(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: NonZeroU32::new(padded_row),
                    rows_per_image: NonZeroU32::new(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        // 'Map' the buffer (i.e. copying from GPU mem into main RAM)
        let buffer_data = {
            let buffer_slice = output_buffer.slice(..);

            // NOTE: We have to create the mapping THEN device.poll() before await
            // the future. Otherwise the application will freeze.
            let mapping = buffer_slice.map_async(wgpu::MapMode::Read);
            self.device.poll(wgpu::Maintain::Wait);
            pollster::block_on(mapping)
                .map_err(|_| CrtError::surface("failed to map readback buffer"))?;

            let padded = buffer_slice.get_mapped_range();
            let row_len = (pixel_size * width) as usize;
            let mut data = Vec::with_capacity(row_len * height as usize);
            for row in padded.chunks(padded_row as usize) {
                data.extend_from_slice(&row[..row_len]);
            }
            data
        };
        output_buffer.unmap();

        image::RgbaImage::from_raw(width, height, buffer_data)
            .ok_or_else(|| CrtError::surface("readback buffer has the wrong size"))
    }

    /// Run `f`, turning any validation error it causes into a [`CrtError`]
    fn validated<T>(&self, what: &str, f: impl FnOnce() -> T) -> CrtResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Ok(value),
            Some(e) => Err(CrtError::surface(format!("{}: {}", what, e))),
        }
    }
}

/// Everything needed to draw with the CRT shader
#[derive(Debug)]
pub struct WgpuShader {
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    /// Holds the 64-byte constant buffer
    uniforms: wgpu::Buffer,
    sampler: wgpu::Sampler,
    input: Option<Arc<SizedTexture>>,
}

impl WgpuShader {
    pub fn input(&self) -> Option<&Arc<SizedTexture>> {
        self.input.as_ref()
    }
}

/// Texture into which an effect renders.  Like the intermediate textures of a compositor, this is
/// only ever grown, so the most recently rendered region is kept alongside it.
#[derive(Debug)]
pub struct WgpuOutput {
    label: String,
    texture: SizedTexture,
    region: Rect,
}

impl WgpuOutput {
    /// The region of the output image which was last rendered.  Its top-left corner is stored at
    /// the texture's origin.
    pub fn region(&self) -> Rect {
        self.region
    }

    pub fn texture(&self) -> &SizedTexture {
        &self.texture
    }

    /// Make sure there's space for a `width` by `height` region
    fn resize(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) {
        let required_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        if !self.texture.fits(required_size) {
            let size = wgpu::Extent3d {
                width: width.max(self.texture.width()),
                height: height.max(self.texture.height()),
                depth_or_array_layers: 1,
            };
            trace!("Growing {} output to {}x{}", self.label, size.width, size.height);
            self.texture = output_texture(device, &self.label, format, size);
        }
    }
}

fn output_texture(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    size: wgpu::Extent3d,
) -> SizedTexture {
    SizedTexture::new(
        device,
        &format!("{} output texture", label),
        size,
        format,
        wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

impl Surface for WgpuSurface {
    type Shader = WgpuShader;
    type Image = Arc<SizedTexture>;
    type Output = WgpuOutput;

    fn create_shader(&mut self, label: &str, source: &str) -> CrtResult<WgpuShader> {
        let device = self.device.clone();
        let format = self.format;
        self.validated(&format!("compiling {} shader", label), || {
            let module = device.create_shader_module(&wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} shader module", label)),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{} bind group layout", label)),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(CONSTANTS_SIZE as u64),
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                multisampled: false,
                                view_dimension: wgpu::TextureViewDimension::D2,
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{} render layout", label)),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{} render pipeline", label)),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &[QuadVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    }],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw, // verts go anti-clockwise
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    // Both of these require GPU features to use
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None, // Not using any depth testing
                multisample: wgpu::MultisampleState::default(), // Not using multi-sampling
                multiview: None,
            });
            let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} constant buffer", label)),
                size: CONSTANTS_SIZE as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            // Samples outside the input are masked out by the shader itself
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(&format!("{} sampler", label)),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            WgpuShader {
                label: label.to_owned(),
                pipeline,
                bind_group_layout,
                uniforms,
                sampler,
                input: None,
            }
        })
    }

    fn create_output(&mut self, label: &str, _shader: &WgpuShader) -> CrtResult<WgpuOutput> {
        let device = self.device.clone();
        let format = self.format;
        self.validated(&format!("creating {} output", label), || WgpuOutput {
            label: label.to_owned(),
            // Placeholder with the smallest size possible; grown on the first draw
            texture: output_texture(&device, label, format, wgpu::Extent3d::default()),
            region: Rect::EMPTY,
        })
    }

    fn bind_input(&mut self, shader: &mut WgpuShader, input: Option<&Arc<SizedTexture>>) {
        shader.input = input.cloned();
    }

    fn upload_constants(&mut self, shader: &WgpuShader, constants: &[u8]) -> CrtResult<()> {
        if constants.len() != CONSTANTS_SIZE {
            return Err(CrtError::surface(format!(
                "constant buffer must be {} bytes, got {}",
                CONSTANTS_SIZE,
                constants.len()
            )));
        }
        self.queue.write_buffer(&shader.uniforms, 0, constants);
        Ok(())
    }

    fn draw(
        &mut self,
        shader: &WgpuShader,
        output: &mut WgpuOutput,
        footprint: Footprint,
    ) -> CrtResult<()> {
        let input = shader
            .input
            .as_ref()
            .ok_or_else(|| CrtError::surface(format!("{} has no input bound", shader.label)))?;
        let region = footprint.output;
        output.region = region;
        if region.is_empty() {
            return Ok(());
        }
        trace!(
            "Drawing {} over {:?}, reading {:?}",
            shader.label,
            region,
            footprint.input
        );
        self.check_texture_size(region.width(), region.height())?;

        let device = self.device.clone();
        let queue = self.queue.clone();
        let format = self.format;
        self.validated(&format!("drawing {}", shader.label), || {
            output.resize(&device, format, region.width(), region.height());
            let input_view = input.view();
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} bind group", shader.label)),
                layout: &shader.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: shader.uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&input_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&shader.sampler),
                    },
                ],
            });
            let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} quad buffer", shader.label)),
                contents: bytemuck::cast_slice(&QuadVertex::quad(region, input.bounds())),
                usage: wgpu::BufferUsages::VERTEX,
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&format!("{} draw", shader.label)),
            });
            {
                let output_view = output.texture.view();
                let render_pass_label = format!("{} render pass", shader.label);
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&render_pass_label),
                    color_attachments: &[wgpu::RenderPassColorAttachment {
                        view: &output_view,
                        resolve_target: None, // No multi-sampling
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: true,
                        },
                    }],
                    depth_stencil_attachment: None, // Not using depth or stencil
                });
                render_pass.set_viewport(
                    0.0,
                    0.0,
                    region.width() as f32,
                    region.height() as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_pipeline(&shader.pipeline);
                render_pass.set_vertex_buffer(0, quad_buffer.slice(..));
                render_pass.set_bind_group(0, &bind_group, &[]);
                render_pass.draw(0..4, 0..1); // Quad always has 4 vertices
            }
            queue.submit(std::iter::once(encoder.finish()));
        })
    }
}

/// The expanded footprint easily outgrows a device's texture limit, which wgpu would otherwise
/// report through its (panicking) uncaptured error handler
fn fits_texture_limit(width: u32, height: u32, max_dimension: u32) -> CrtResult<()> {
    if width > max_dimension || height > max_dimension {
        return Err(CrtError::surface(format!(
            "{}x{} exceeds the device's maximum texture size of {}",
            width, height, max_dimension
        )));
    }
    Ok(())
}

/// Rows copied out of a texture must be padded to a multiple of
/// [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`]
fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * std::mem::size_of::<u32>() as u32;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (unpadded + align - 1) / align * align
}

//////////
// QUAD //
//////////

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2], // z coordinates set to 0 by the vertex shader
    uv: [f32; 2],
}

impl QuadVertex {
    /// The vertices of a single quad which fills the viewport, sampling the pixels of `input`
    /// which lie under `region`.  Both rects are in the same pixel space.
    // NOTE: The v-coordinates are inverted because wgpu uses y-up for clip coordinates, but
    // y-down for textures
    fn quad(region: Rect, input: Rect) -> [Self; 4] {
        let w = input.width().max(1) as f32;
        let h = input.height().max(1) as f32;
        let u = |x: i32| (x - input.left()) as f32 / w;
        let v = |y: i32| (y - input.top()) as f32 / h;
        let (u0, u1) = (u(region.left()), u(region.right()));
        let (v0, v1) = (v(region.top()), v(region.bottom()));
        #[rustfmt::skip]
        let verts = [
            Self { position: [-1.0, -1.0], uv: [u0, v1] },
            Self { position: [ 1.0, -1.0], uv: [u1, v1] },
            Self { position: [-1.0,  1.0], uv: [u0, v0] },
            Self { position: [ 1.0,  1.0], uv: [u1, v0] },
        ];
        verts
    }

    fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covering_input_spans_unit_uvs() {
        let input = Rect::from_origin(640, 480);
        let quad = QuadVertex::quad(input, input);
        assert_eq!(quad[0].uv, [0.0, 1.0]);
        assert_eq!(quad[3].uv, [1.0, 0.0]);
    }

    #[test]
    fn quad_over_expanded_region_samples_outside_input() {
        let input = Rect::from_origin(100, 100);
        let quad = QuadVertex::quad(Rect::new(-50, 0, 150, 100), input);
        assert_eq!(quad[0].uv, [-0.5, 1.0]);
        assert_eq!(quad[1].uv, [1.5, 1.0]);
    }

    #[test]
    fn quad_is_relative_to_input_origin() {
        let input = Rect::new(10, 20, 110, 220);
        let quad = QuadVertex::quad(Rect::new(60, 120, 110, 220), input);
        assert_eq!(quad[2].uv, [0.5, 0.5]);
        assert_eq!(quad[1].uv, [1.0, 1.0]);
    }

    #[test]
    fn oversized_textures_are_rejected() {
        assert_eq!(fits_texture_limit(8192, 8192, 8192), Ok(()));
        assert_eq!(fits_texture_limit(1, 1, 8192), Ok(()));
        // A 5K frame grown by the margin on both sides
        let grown = Rect::from_origin(5120, 2880).expand(crate::footprint::EXPANSION_MARGIN);
        assert!(matches!(
            fits_texture_limit(grown.width(), grown.height(), 8192),
            Err(CrtError::Surface(_))
        ));
        assert!(fits_texture_limit(16, 20_000, 8192).is_err());
    }

    fn implements_surface<S: Surface>() {}

    #[test]
    fn wgpu_surface_is_a_surface() {
        implements_surface::<WgpuSurface>();
    }

    #[test]
    fn readback_rows_are_padded() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let layout = QuadVertex::layout();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.attributes[1].offset, 8);
    }
}
