//! Procedural sky used as background and as environment lighting.
//!
//! The same `environment_radiance` WGSL function shades the background and
//! feeds the ambient terms of the standard model, so what is visible behind
//! the sphere is also what it reflects.

use crate::draw2d::Color;
use crate::error::MaterialError;
use crate::gpu::GpuContext;
use crate::mesh_pass::{DEPTH_FORMAT, HDR_FORMAT};
use crate::patch;

/// Gradient sky with a sun glow in the light direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Environment {
    pub zenith: Color,
    pub horizon: Color,
    pub ground: Color,
    pub sun: Color,
    /// Scales the whole environment, background and lighting alike.
    pub intensity: f32,
    /// Background softness in [0, 1]. Lighting always uses the blurred sky.
    pub blurriness: f32,
}

impl Environment {
    pub fn sunset() -> Self {
        Self {
            zenith: Color::from_hex(0x2b3a67),
            horizon: Color::from_hex(0xf08a4b),
            ground: Color::from_hex(0x3a2e39),
            sun: Color::from_hex(0xffd7a0),
            intensity: 1.0,
            blurriness: 0.5,
        }
    }

    pub fn with_blurriness(mut self, blurriness: f32) -> Self {
        self.blurriness = blurriness.clamp(0.0, 1.0);
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::sunset()
    }
}

/// Fullscreen background pass drawn first into the HDR target.
pub struct SkyPass {
    pipeline: wgpu::RenderPipeline,
}

impl SkyPass {
    /// `frame_layout` is the uniform-only frame layout shared with the depth models.
    pub fn new(gpu: &GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Result<Self, MaterialError> {
        let device = &gpu.device;
        let source = patch::compile_scene_program("Sky", include_str!("shaders/sky.wgsl"))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sky Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sky Pipeline Layout"),
            bind_group_layouts: &[frame_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sky Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            // Background: ignores and leaves the depth buffer untouched.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self { pipeline })
    }

    pub fn render(&self, render_pass: &mut wgpu::RenderPass, frame_bind_group: &wgpu::BindGroup) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, frame_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_program_validates() {
        let source = patch::compile_scene_program("Sky", include_str!("shaders/sky.wgsl")).unwrap();
        assert!(source.contains("environment_radiance"));
    }

    #[test]
    fn sunset_is_warm_at_the_horizon_and_cool_above() {
        let sky = Environment::sunset();
        assert!(sky.horizon.r > sky.horizon.b);
        assert!(sky.zenith.b > sky.zenith.r);
        assert_eq!(sky.blurriness, 0.5);
        assert_eq!(sky.with_blurriness(3.0).blurriness, 1.0);
    }
}
