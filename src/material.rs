//! GPU materials built from patched base models.
//!
//! A [`PatchedMaterial`] owns a colour-pass program (the patched
//! [`BaseModel::Standard`]) and optionally a depth-pass program (the same
//! patch applied to [`BaseModel::Depth`]) for shadow rendering. Both programs
//! read the same [`UniformStore`] through a single uniform buffer bound at
//! [`MATERIAL_GROUP`], so anything the patch computes from its uniforms is
//! computed identically in both passes.
//!
//! ```ignore
//! let params = DissolveParams::default();
//! let uniforms = params.uniform_store()?.into_shared();
//! let material = PatchedMaterial::new(
//!     &gpu,
//!     renderer.layouts(),
//!     MaterialDescriptor::new("Dissolve Sphere", dissolve::shader_patch(), uniforms.clone())
//!         .with_depth_pass(true),
//! )?;
//!
//! // Per frame:
//! uniforms.borrow_mut().tick(elapsed);
//! material.upload(&gpu);
//! ```

use crate::draw2d::Color;
use crate::error::MaterialError;
use crate::gpu::GpuContext;
use crate::mesh::Vertex3d;
use crate::mesh_pass::{DEPTH_FORMAT, HDR_FORMAT, PassLayouts};
use crate::patch::{self, BaseModel, MATERIAL_GROUP, PatchedShader, ShaderPatch};
use crate::shadow::SHADOW_FORMAT;
use crate::uniforms::{SharedUniforms, UniformStore};

/// Fixed surface inputs of the standard model, set per object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceParams {
    pub base_color: Color,
    pub metalness: f32,
    pub roughness: f32,
    /// Scale of the sky's contribution to ambient lighting.
    pub env_intensity: f32,
    /// Disable back-face culling and light back faces with the flipped normal.
    pub double_sided: bool,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            base_color: Color::WHITE,
            metalness: 0.5,
            roughness: 0.25,
            env_intensity: 0.5,
            double_sided: true,
        }
    }
}

impl SurfaceParams {
    pub fn with_color(mut self, color: Color) -> Self {
        self.base_color = color;
        self
    }
}

/// Pass a program is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Lit, into the HDR colour target.
    Color,
    /// Depth only, into the shadow map.
    Depth,
}

impl Variant {
    pub fn base_model(self) -> BaseModel {
        match self {
            Self::Color => BaseModel::Standard,
            Self::Depth => BaseModel::Depth,
        }
    }
}

/// Everything needed to build a [`PatchedMaterial`].
#[derive(Clone, Debug)]
pub struct MaterialDescriptor {
    pub label: String,
    pub patch: ShaderPatch,
    pub uniforms: SharedUniforms,
    pub surface: SurfaceParams,
    /// Also build the depth-pass program so the material casts shadows.
    pub depth_pass: bool,
}

impl MaterialDescriptor {
    pub fn new(label: impl Into<String>, patch: ShaderPatch, uniforms: SharedUniforms) -> Self {
        Self {
            label: label.into(),
            patch,
            uniforms,
            surface: SurfaceParams::default(),
            depth_pass: false,
        }
    }

    /// An unpatched standard material with no custom uniforms.
    pub fn standard(label: impl Into<String>, surface: SurfaceParams) -> Self {
        Self::new(label, ShaderPatch::default(), UniformStore::new().into_shared()).with_surface(surface)
    }

    pub fn with_surface(mut self, surface: SurfaceParams) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_depth_pass(mut self, depth_pass: bool) -> Self {
        self.depth_pass = depth_pass;
        self
    }

    /// Patch and validate the WGSL for `variant` without touching the GPU.
    pub fn compile(&self, variant: Variant) -> Result<PatchedShader, MaterialError> {
        patch::compile(
            variant.base_model(),
            &self.patch,
            &self.uniforms.borrow(),
            &self.label,
        )
    }
}

/// One compiled program and its pipeline.
pub struct MaterialProgram {
    shader: PatchedShader,
    pipeline: wgpu::RenderPipeline,
}

impl MaterialProgram {
    pub fn shader(&self) -> &PatchedShader {
        &self.shader
    }
}

/// The uniform buffer mirroring a material's [`UniformStore`].
struct UniformBlock {
    store: SharedUniforms,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    scratch: Vec<u8>,
}

impl UniformBlock {
    fn new(gpu: &GpuContext, layout: &wgpu::BindGroupLayout, store: SharedUniforms, label: &str) -> Self {
        let mut scratch = Vec::new();
        store.borrow().write_bytes(&mut scratch);

        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Uniforms")),
            size: scratch.len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue.write_buffer(&buffer, 0, &scratch);

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Uniform Bind Group")),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            store,
            buffer,
            bind_group,
            scratch,
        }
    }

    fn upload(&mut self, gpu: &GpuContext) {
        self.store.borrow().write_bytes(&mut self.scratch);
        gpu.queue.write_buffer(&self.buffer, 0, &self.scratch);
    }
}

/// A material with a colour-pass and an optional depth-pass program.
pub struct PatchedMaterial {
    label: String,
    surface: SurfaceParams,
    uniforms: SharedUniforms,
    color: MaterialProgram,
    depth: Option<MaterialProgram>,
    block: Option<UniformBlock>,
}

impl PatchedMaterial {
    /// Patch, validate and build the pipelines for `desc`.
    ///
    /// Fails with [`MaterialError::PatchPointNotFound`] or
    /// [`MaterialError::ShaderCompile`] before any GPU object is created if
    /// the patch is malformed; wgpu validation errors raised while building
    /// the pipelines are reported as [`MaterialError::ShaderCompile`] too.
    pub fn new(
        gpu: &GpuContext,
        layouts: &PassLayouts,
        desc: MaterialDescriptor,
    ) -> Result<Self, MaterialError> {
        let color_shader = desc.compile(Variant::Color)?;
        let depth_shader = desc
            .depth_pass
            .then(|| desc.compile(Variant::Depth))
            .transpose()?;

        let has_block = !desc.uniforms.borrow().is_empty();

        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let color = build_program(gpu, layouts, color_shader, Variant::Color, has_block, desc.surface.double_sided);
        let depth = depth_shader.map(|shader| {
            build_program(gpu, layouts, shader, Variant::Depth, has_block, desc.surface.double_sided)
        });
        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(MaterialError::ShaderCompile {
                label: desc.label,
                diagnostic: err.to_string(),
            });
        }

        let block = has_block.then(|| {
            UniformBlock::new(gpu, &layouts.material, desc.uniforms.clone(), &desc.label)
        });

        log::info!(
            "built material `{}` (shadow caster: {})",
            desc.label,
            depth.is_some()
        );

        Ok(Self {
            label: desc.label,
            surface: desc.surface,
            uniforms: desc.uniforms,
            color,
            depth,
            block,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn surface(&self) -> &SurfaceParams {
        &self.surface
    }

    pub fn set_surface(&mut self, surface: SurfaceParams) {
        self.surface = surface;
    }

    /// Shared handle to the material's uniform values.
    pub fn uniforms(&self) -> &SharedUniforms {
        &self.uniforms
    }

    pub fn color_program(&self) -> &MaterialProgram {
        &self.color
    }

    pub fn depth_program(&self) -> Option<&MaterialProgram> {
        self.depth.as_ref()
    }

    pub fn casts_shadow(&self) -> bool {
        self.depth.is_some()
    }

    /// Copy the current uniform values to the GPU.
    pub fn upload(&mut self, gpu: &GpuContext) {
        if let Some(block) = &mut self.block {
            block.upload(gpu);
        }
    }

    /// Bind the pipeline and uniform block for `variant`.
    ///
    /// Returns false, binding nothing, when the material has no program for
    /// that pass.
    pub fn bind(&self, render_pass: &mut wgpu::RenderPass, variant: Variant) -> bool {
        let program = match variant {
            Variant::Color => &self.color,
            Variant::Depth => match &self.depth {
                Some(program) => program,
                None => return false,
            },
        };
        render_pass.set_pipeline(&program.pipeline);
        if let Some(block) = &self.block {
            render_pass.set_bind_group(MATERIAL_GROUP, &block.bind_group, &[]);
        }
        true
    }
}

fn build_program(
    gpu: &GpuContext,
    layouts: &PassLayouts,
    shader: PatchedShader,
    variant: Variant,
    has_block: bool,
    double_sided: bool,
) -> MaterialProgram {
    let device = &gpu.device;

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(shader.label()),
        source: wgpu::ShaderSource::Wgsl(shader.source().into()),
    });

    let frame_layout = match variant {
        Variant::Color => &layouts.frame_color,
        Variant::Depth => &layouts.frame_depth,
    };
    let mut bind_group_layouts = vec![frame_layout, &layouts.object];
    if has_block {
        bind_group_layouts.push(&layouts.material);
    }

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(shader.label()),
        bind_group_layouts: &bind_group_layouts,
        push_constant_ranges: &[],
    });

    let color_targets = [Some(wgpu::ColorTargetState {
        format: HDR_FORMAT,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    })];
    let (targets, depth_format, bias): (&[Option<wgpu::ColorTargetState>], _, _) = match variant {
        Variant::Color => (&color_targets, DEPTH_FORMAT, wgpu::DepthBiasState::default()),
        Variant::Depth => (
            &[],
            SHADOW_FORMAT,
            wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        ),
    };

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(shader.label()),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs"),
            buffers: &[Vertex3d::LAYOUT],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if double_sided {
                None
            } else {
                Some(wgpu::Face::Back)
            },
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias,
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    MaterialProgram { shader, pipeline }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissolve::{self, DissolveParams};

    #[test]
    fn standard_descriptor_compiles_both_variants() {
        let desc = MaterialDescriptor::standard("Plane", SurfaceParams::default());
        let color = desc.compile(Variant::Color).unwrap();
        let depth = desc.compile(Variant::Depth).unwrap();
        assert_eq!(color.model(), BaseModel::Standard);
        assert_eq!(depth.model(), BaseModel::Depth);
        assert!(!color.source().contains(UniformStore::STRUCT_NAME));
    }

    #[test]
    fn dissolve_descriptor_shares_the_uniform_block() {
        let uniforms = DissolveParams::default().uniform_store().unwrap().into_shared();
        let desc = MaterialDescriptor::new("Sphere", dissolve::shader_patch(), uniforms.clone())
            .with_depth_pass(true);

        let color = desc.compile(Variant::Color).unwrap();
        let depth = desc.compile(Variant::Depth).unwrap();
        let declaration = uniforms.borrow().wgsl_declaration(MATERIAL_GROUP, 0);
        assert!(color.source().contains(&declaration));
        assert!(depth.source().contains(&declaration));
        assert_eq!(color.label(), "Sphere (standard)");
        assert_eq!(depth.label(), "Sphere (depth)");
    }

    #[test]
    fn unknown_patch_point_fails_before_gpu_work() {
        let patch = ShaderPatch::default().with_patch_map(
            crate::patch::PatchMap::new().with("lights_fragment", "out_color = vec4<f32>(1.0);"),
        );
        let desc = MaterialDescriptor::new("Broken", patch, UniformStore::new().into_shared());
        assert!(matches!(
            desc.compile(Variant::Color),
            Err(MaterialError::PatchPointNotFound { .. })
        ));
    }

    #[test]
    fn surface_defaults_match_the_demo_scene() {
        let surface = SurfaceParams::default();
        assert_eq!(surface.metalness, 0.5);
        assert_eq!(surface.roughness, 0.25);
        assert_eq!(surface.env_intensity, 0.5);
        assert!(surface.double_sided);
    }
}
