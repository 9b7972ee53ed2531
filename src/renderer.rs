//! Frame orchestration: shadow pass, HDR scene pass, bloom and tonemap, then
//! the 2D overlay on the surface.

use crate::camera::Camera;
use crate::draw2d::Draw2d;
use crate::error::MaterialError;
use crate::gpu::GpuContext;
use crate::mesh_pass::{FrameUniforms, HDR_FORMAT, MeshPass, PassLayouts};
use crate::post_process::{Bloom, BloomSettings, RenderTarget};
use crate::scene::Scene;
use crate::sky::SkyPass;

pub struct Renderer {
    layouts: PassLayouts,
    mesh_pass: MeshPass,
    sky: SkyPass,
    hdr: RenderTarget,
    bloom: Bloom,
    draw2d: Draw2d,
}

impl Renderer {
    pub fn new(gpu: &GpuContext, shadow_map_size: u32) -> Result<Self, MaterialError> {
        let layouts = PassLayouts::new(&gpu.device);
        let mesh_pass = MeshPass::new(gpu, &layouts, shadow_map_size);
        let sky = SkyPass::new(gpu, &layouts.frame_depth)?;

        Ok(Self {
            mesh_pass,
            sky,
            hdr: RenderTarget::new(gpu, "HDR Scene", HDR_FORMAT, 1),
            bloom: Bloom::new(gpu, HDR_FORMAT, gpu.config.format),
            draw2d: Draw2d::new(gpu),
            layouts,
        })
    }

    /// Layouts materials must be built against.
    pub fn layouts(&self) -> &PassLayouts {
        &self.layouts
    }

    /// Overlay batch for this frame. Cleared after each [`render`](Self::render).
    pub fn draw2d(&mut self) -> &mut Draw2d {
        &mut self.draw2d
    }

    /// Render and present one frame. Skips the frame if the surface is not
    /// available.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        scene: &mut Scene,
        camera: &Camera,
        bloom: &BloomSettings,
    ) {
        let Some(frame) = gpu.acquire() else {
            self.draw2d.clear();
            return;
        };
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.mesh_pass.ensure_depth_size(gpu);
        self.hdr.ensure_size(gpu);

        scene.upload(gpu);
        self.mesh_pass.write_frame(
            gpu,
            &FrameUniforms::new(camera, gpu.aspect(), &scene.light, &scene.environment),
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.mesh_pass.render_shadows(&mut encoder, scene);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.hdr.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.mesh_pass.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.sky
                .render(&mut render_pass, self.mesh_pass.frame_bind_group());
            self.mesh_pass.render_meshes(&mut render_pass, scene);
        }

        self.bloom
            .render(gpu, &mut encoder, &self.hdr, &surface_view, bloom);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.draw2d.render(gpu, &mut render_pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.draw2d.clear();
    }
}
