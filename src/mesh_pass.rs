//! Shadow and HDR colour passes over the scene's renderable entities.
//!
//! Bind groups used by every scene program:
//! - **Group 0**: frame uniforms (camera, light, sky). The colour layout adds
//!   the shadow map and its comparison sampler at bindings 1 and 2.
//! - **Group 1**: per-object uniforms (model and normal matrices, surface).
//! - **Group 2**: the material's uniform block, when it has one.

use crate::camera::Camera;
use crate::ecs::{CastsShadow, Renderable};
use crate::gpu::GpuContext;
use crate::material::{SurfaceParams, Variant};
use crate::mesh::Transform;
use crate::scene::Scene;
use crate::shadow::{DirectionalLight, ShadowMap};
use crate::sky::Environment;

pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame uniforms, laid out as `FrameUniforms` in `common.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub _padding0: f32,
    /// Unit vector towards the light.
    pub light_direction: [f32; 3],
    pub light_intensity: f32,
    pub light_color: [f32; 3],
    pub shadow_normal_bias: f32,
    pub sky_zenith: [f32; 3],
    pub sky_blurriness: f32,
    pub sky_horizon: [f32; 3],
    pub shadow_texel_size: f32,
    pub sky_ground: [f32; 3],
    pub sky_intensity: f32,
    pub sun_color: [f32; 3],
    pub _padding1: f32,
}

impl FrameUniforms {
    pub fn new(
        camera: &Camera,
        aspect: f32,
        light: &DirectionalLight,
        environment: &Environment,
    ) -> Self {
        let view_proj = camera.view_projection(aspect);
        let rgb = |c: crate::draw2d::Color| [c.r, c.g, c.b];
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            light_view_proj: light.view_proj().to_cols_array_2d(),
            camera_position: camera.position.to_array(),
            _padding0: 0.0,
            light_direction: light.direction().to_array(),
            light_intensity: light.intensity,
            light_color: rgb(light.color),
            shadow_normal_bias: light.shadow.normal_bias,
            sky_zenith: rgb(environment.zenith),
            sky_blurriness: environment.blurriness,
            sky_horizon: rgb(environment.horizon),
            shadow_texel_size: light.texel_size(),
            sky_ground: rgb(environment.ground),
            sky_intensity: environment.intensity,
            sun_color: rgb(environment.sun),
            _padding1: 0.0,
        }
    }
}

/// Per-object uniforms, laid out as `ObjectUniforms` in `common.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub env_intensity: f32,
    /// 1.0 to sample the shadow map, 0.0 to ignore it.
    pub receive_shadow: f32,
}

impl ObjectUniforms {
    pub fn new(transform: &Transform, surface: &SurfaceParams, receive_shadow: bool) -> Self {
        let c = surface.base_color;
        Self {
            model: transform.matrix().to_cols_array_2d(),
            normal_matrix: transform.normal_matrix().to_cols_array_2d(),
            base_color: [c.r, c.g, c.b, c.a],
            metalness: surface.metalness,
            roughness: surface.roughness,
            env_intensity: surface.env_intensity,
            receive_shadow: if receive_shadow { 1.0 } else { 0.0 },
        }
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Bind group layouts shared by all scene programs.
pub struct PassLayouts {
    /// Frame uniforms plus shadow map, for the colour pass.
    pub frame_color: wgpu::BindGroupLayout,
    /// Frame uniforms only, for the depth pass and the sky.
    pub frame_depth: wgpu::BindGroupLayout,
    pub object: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
}

impl PassLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame_color = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Colour Layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let single = |label| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[uniform_entry(0)],
            })
        };

        Self {
            frame_color,
            frame_depth: single("Frame Depth Layout"),
            object: single("Object Layout"),
            material: single("Material Layout"),
        }
    }
}

/// Uniform buffer and bind group for one entity.
pub struct ObjectBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ObjectBinding {
    pub fn new(gpu: &GpuContext, layouts: &PassLayouts) -> Self {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniforms"),
            size: std::mem::size_of::<ObjectUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    pub fn write(&self, gpu: &GpuContext, uniforms: &ObjectUniforms) {
        gpu.queue
            .write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Owns the frame uniforms, the main depth buffer and the shadow map, and
/// draws every [`Renderable`] in the scene.
pub struct MeshPass {
    frame_buffer: wgpu::Buffer,
    color_frame_bind_group: wgpu::BindGroup,
    depth_frame_bind_group: wgpu::BindGroup,
    shadow_map: ShadowMap,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
}

impl MeshPass {
    pub fn new(gpu: &GpuContext, layouts: &PassLayouts, shadow_map_size: u32) -> Self {
        let device = &gpu.device;

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shadow_map = ShadowMap::new(gpu, shadow_map_size);

        let color_frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Colour Bind Group"),
            layout: &layouts.frame_color,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
        });

        let depth_frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Depth Bind Group"),
            layout: &layouts.frame_depth,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let depth_view = Self::create_depth_view(gpu);

        Self {
            frame_buffer,
            color_frame_bind_group,
            depth_frame_bind_group,
            shadow_map,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
        }
    }

    fn create_depth_view(gpu: &GpuContext) -> wgpu::TextureView {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth"),
            size: wgpu::Extent3d {
                width: gpu.width(),
                height: gpu.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Recreate the depth buffer if the surface was resized.
    pub fn ensure_depth_size(&mut self, gpu: &GpuContext) {
        if self.depth_size != (gpu.width(), gpu.height()) {
            self.depth_view = Self::create_depth_view(gpu);
            self.depth_size = (gpu.width(), gpu.height());
        }
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Frame bind group without the shadow map, for the depth models and the sky.
    pub fn frame_bind_group(&self) -> &wgpu::BindGroup {
        &self.depth_frame_bind_group
    }

    pub fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    pub fn write_frame(&self, gpu: &GpuContext, uniforms: &FrameUniforms) {
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    /// Render every shadow-casting entity into the shadow map.
    pub fn render_shadows(&self, encoder: &mut wgpu::CommandEncoder, scene: &Scene) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_bind_group(0, &self.depth_frame_bind_group, &[]);
        for (_, (renderable, _)) in scene.world.query::<(&Renderable, &CastsShadow)>().iter() {
            draw_renderable(&mut render_pass, scene, renderable, Variant::Depth);
        }
    }

    /// Draw every entity with its colour program. The caller owns the pass
    /// so the sky can be drawn into it first.
    pub fn render_meshes(&self, render_pass: &mut wgpu::RenderPass, scene: &Scene) {
        render_pass.set_bind_group(0, &self.color_frame_bind_group, &[]);
        for (_, renderable) in scene.world.query::<&Renderable>().iter() {
            draw_renderable(render_pass, scene, renderable, Variant::Color);
        }
    }
}

fn draw_renderable(
    render_pass: &mut wgpu::RenderPass,
    scene: &Scene,
    renderable: &Renderable,
    variant: Variant,
) {
    let (Some(mesh), Some(material)) = (
        scene.mesh(renderable.mesh),
        scene.material(renderable.material),
    ) else {
        return;
    };
    if !material.bind(render_pass, variant) {
        return;
    }
    render_pass.set_bind_group(1, renderable.binding.bind_group(), &[]);
    mesh.draw(render_pass);
}
