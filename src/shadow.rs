//! Directional light and its shadow map.

use glam::{Mat4, Vec3};

use crate::draw2d::Color;
use crate::gpu::GpuContext;

pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Orthographic shadow frustum and filtering parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    /// Shadow map width and height in texels.
    pub map_size: u32,
    /// Half-width of the orthographic frustum in world units.
    pub extent: f32,
    pub near: f32,
    pub far: f32,
    /// World-space offset along the surface normal before the depth lookup.
    pub normal_bias: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 1024,
            extent: 8.0,
            near: 0.1,
            far: 30.0,
            normal_bias: 0.05,
        }
    }
}

/// A directional light positioned for shadow rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Color,
    pub intensity: f32,
    pub shadow: ShadowSettings,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(6.25, 3.0, 4.0),
            target: Vec3::ZERO,
            color: Color::WHITE,
            intensity: 4.0,
            shadow: ShadowSettings::default(),
        }
    }
}

impl DirectionalLight {
    /// Unit vector from the scene towards the light.
    pub fn direction(&self) -> Vec3 {
        (self.position - self.target).normalize_or(Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        let s = &self.shadow;
        let up = if self.direction().abs().dot(Vec3::Y) > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, self.target, up);
        let proj = Mat4::orthographic_rh(-s.extent, s.extent, -s.extent, s.extent, s.near, s.far);
        proj * view
    }

    /// Size of one shadow map texel in UV units, for PCF offsets.
    pub fn texel_size(&self) -> f32 {
        1.0 / self.shadow.map_size.max(1) as f32
    }
}

/// Depth texture rendered from the light, sampled with a comparison sampler.
pub struct ShadowMap {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    size: u32,
}

impl ShadowMap {
    pub fn new(gpu: &GpuContext, size: u32) -> Self {
        let size = size.clamp(1, gpu.device.limits().max_texture_dimension_2d);
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SHADOW_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(m: Mat4, p: Vec3) -> Vec3 {
        let clip = m * p.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn direction_points_at_the_light() {
        let light = DirectionalLight::default();
        let d = light.direction();
        assert!((d.length() - 1.0).abs() < 1e-6);
        assert!(d.dot(Vec3::new(6.25, 3.0, 4.0).normalize()) > 0.9999);
    }

    #[test]
    fn scene_fits_inside_the_shadow_frustum() {
        let light = DirectionalLight::default();
        let m = light.view_proj();
        // Sphere and receiver plane region of the default scene.
        let points = [
            Vec3::ZERO,
            Vec3::X,
            Vec3::NEG_Y,
            Vec3::new(-2.0, -2.0, -2.0),
            Vec3::new(-4.0, -5.0, 1.0),
        ];
        for p in points {
            let ndc = project(m, p);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{p} -> {ndc}");
            assert!((0.0..=1.0).contains(&ndc.z), "{p} -> {ndc}");
        }
    }

    #[test]
    fn nearer_points_have_smaller_depth() {
        let light = DirectionalLight::default();
        let m = light.view_proj();
        let near = project(m, light.direction());
        let far = project(m, -light.direction());
        assert!(near.z < far.z);
    }
}
