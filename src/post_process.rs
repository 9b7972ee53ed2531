//! HDR post-processing: bloom and tonemapping.
//!
//! The chain runs after the colour pass:
//!
//! 1. bright pass: HDR scene → half-resolution target, keeping pixels above
//!    the luminance threshold (soft knee of width `smoothing`),
//! 2. horizontal then vertical gaussian blur at half resolution,
//! 3. composite: `(scene + glow * intensity) * exposure`, ACES tonemapped
//!    into the surface format.
//!
//! With bloom disabled only the composite runs, with zero glow.

use crate::gpu::GpuContext;

/// User-tunable bloom parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomSettings {
    pub enabled: bool,
    /// Luminance above which pixels start to glow.
    pub threshold: f32,
    pub intensity: f32,
    /// Width of the soft knee above `threshold`.
    pub smoothing: f32,
    pub exposure: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            intensity: 1.0,
            smoothing: 0.1,
            exposure: 1.0,
        }
    }
}

impl BloomSettings {
    /// Values forced into the ranges the panel exposes.
    pub fn clamped(self) -> Self {
        Self {
            threshold: self.threshold.clamp(0.0, 5.0),
            intensity: self.intensity.clamp(0.0, 3.0),
            smoothing: self.smoothing.clamp(0.0, 0.5),
            exposure: self.exposure.max(0.0),
            ..self
        }
    }
}

/// Uniforms shared by every stage of `bloom.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostUniforms {
    pub texel_size: [f32; 2],
    pub direction: [f32; 2],
    pub threshold: f32,
    pub smoothing: f32,
    pub intensity: f32,
    pub exposure: f32,
}

fn scaled_size(width: u32, height: u32, divisor: u32) -> (u32, u32) {
    let divisor = divisor.max(1);
    ((width / divisor).max(1), (height / divisor).max(1))
}

/// An off-screen colour target that follows the surface size.
pub struct RenderTarget {
    pub view: wgpu::TextureView,
    label: &'static str,
    format: wgpu::TextureFormat,
    divisor: u32,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// A target of the surface size divided by `divisor`.
    pub fn new(gpu: &GpuContext, label: &'static str, format: wgpu::TextureFormat, divisor: u32) -> Self {
        let (width, height) = scaled_size(gpu.width(), gpu.height(), divisor);
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            view,
            label,
            format,
            divisor,
            width,
            height,
        }
    }

    /// Recreate the texture if the surface was resized.
    pub fn ensure_size(&mut self, gpu: &GpuContext) {
        if (self.width, self.height) != scaled_size(gpu.width(), gpu.height(), self.divisor) {
            *self = Self::new(gpu, self.label, self.format, self.divisor);
        }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }
}

/// One fullscreen stage of the bloom chain, with its own uniform buffer so
/// every stage keeps its values within a single submission.
struct PostProcessPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
}

impl PostProcessPass {
    fn new(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        entry_point: &str,
        format: wgpu::TextureFormat,
        label: &'static str,
    ) -> Self {
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(entry_point),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<PostUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            label,
            pipeline,
            uniform_buffer,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        bind_group_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        target: &wgpu::TextureView,
        primary: &wgpu::TextureView,
        secondary: &wgpu::TextureView,
        uniforms: &PostUniforms,
    ) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(primary),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(secondary),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// Bright pass, separable blur and tonemapping composite.
pub struct Bloom {
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright: PostProcessPass,
    blur_horizontal: PostProcessPass,
    blur_vertical: PostProcessPass,
    composite: PostProcessPass,
    half_a: RenderTarget,
    half_b: RenderTarget,
}

impl Bloom {
    /// `hdr_format` is the scene target format; the composite writes
    /// `output_format`.
    pub fn new(gpu: &GpuContext, hdr_format: wgpu::TextureFormat, output_format: wgpu::TextureFormat) -> Self {
        let device = &gpu.device;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom.wgsl").into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Bloom Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bloom Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pass = |entry, format, label| {
            PostProcessPass::new(device, &module, &pipeline_layout, entry, format, label)
        };

        Self {
            bright: pass("fs_bright", hdr_format, "Bloom Bright Pass"),
            blur_horizontal: pass("fs_blur", hdr_format, "Bloom Blur H"),
            blur_vertical: pass("fs_blur", hdr_format, "Bloom Blur V"),
            composite: pass("fs_composite", output_format, "Tonemap Composite"),
            half_a: RenderTarget::new(gpu, "Bloom Half A", hdr_format, 2),
            half_b: RenderTarget::new(gpu, "Bloom Half B", hdr_format, 2),
            bind_group_layout,
            sampler,
        }
    }

    /// Run the chain from `scene` (full-resolution HDR) into `output`.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &RenderTarget,
        output: &wgpu::TextureView,
        settings: &BloomSettings,
    ) {
        self.half_a.ensure_size(gpu);
        self.half_b.ensure_size(gpu);

        let settings = settings.clamped();
        let base = PostUniforms {
            threshold: settings.threshold,
            smoothing: settings.smoothing,
            intensity: if settings.enabled { settings.intensity } else { 0.0 },
            exposure: settings.exposure,
            ..Default::default()
        };
        let layout = &self.bind_group_layout;
        let sampler = &self.sampler;

        if settings.enabled {
            self.bright.run(
                gpu,
                encoder,
                layout,
                sampler,
                &self.half_a.view,
                &scene.view,
                &scene.view,
                &PostUniforms {
                    texel_size: scene.texel_size(),
                    ..base
                },
            );
            self.blur_horizontal.run(
                gpu,
                encoder,
                layout,
                sampler,
                &self.half_b.view,
                &self.half_a.view,
                &self.half_a.view,
                &PostUniforms {
                    texel_size: self.half_a.texel_size(),
                    direction: [1.0, 0.0],
                    ..base
                },
            );
            self.blur_vertical.run(
                gpu,
                encoder,
                layout,
                sampler,
                &self.half_a.view,
                &self.half_b.view,
                &self.half_b.view,
                &PostUniforms {
                    texel_size: self.half_b.texel_size(),
                    direction: [0.0, 1.0],
                    ..base
                },
            );
        }

        self.composite.run(
            gpu,
            encoder,
            layout,
            sampler,
            output,
            &scene.view,
            &self.half_a.view,
            &PostUniforms {
                texel_size: scene.texel_size(),
                ..base
            },
        );
    }
}
