//! Mesh primitives and transforms.
//!
//! - [`Vertex3d`]: position, normal and UV (32 bytes, locations 0..=2)
//! - [`Mesh`]: GPU vertex and index buffers
//! - [`Transform`]: translation, rotation and scale
//!
//! Geometry is generated on the CPU by [`sphere_geometry`] and
//! [`plane_geometry`] and uploaded by the matching [`Mesh`] constructors.

use glam::{Mat4, Quat, Vec3};

use crate::gpu::GpuContext;

/// A vertex with position, normal, and texture coordinates.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// UV sphere centred at the origin. `segments` around the equator, `rings`
/// from pole to pole.
pub fn sphere_geometry(radius: f32, segments: u32, rings: u32) -> (Vec<Vertex3d>, Vec<u32>) {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
    let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for seg in 0..=segments {
            let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
            let normal = Vec3::new(-ring_radius * theta.cos(), y, ring_radius * theta.sin());
            vertices.push(Vertex3d::new(
                (normal * radius).to_array(),
                normal.to_array(),
                [seg as f32 / segments as f32, ring as f32 / rings as f32],
            ));
        }
    }

    for ring in 0..rings {
        for seg in 0..segments {
            let current = ring * (segments + 1) + seg;
            let next = current + segments + 1;

            if ring != 0 {
                indices.extend_from_slice(&[current, next, current + 1]);
            }
            if ring != rings - 1 {
                indices.extend_from_slice(&[current + 1, next, next + 1]);
            }
        }
    }

    (vertices, indices)
}

/// Square in the XZ plane facing +Y.
pub fn plane_geometry(size: f32) -> (Vec<Vertex3d>, Vec<u32>) {
    let half = size * 0.5;
    let up = [0.0, 1.0, 0.0];
    let vertices = vec![
        Vertex3d::new([-half, 0.0, -half], up, [0.0, 0.0]),
        Vertex3d::new([-half, 0.0, half], up, [0.0, 1.0]),
        Vertex3d::new([half, 0.0, half], up, [1.0, 1.0]),
        Vertex3d::new([half, 0.0, -half], up, [1.0, 0.0]),
    ];
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

/// GPU-resident geometry.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl Mesh {
    pub fn new(gpu: &GpuContext, vertices: &[Vertex3d], indices: &[u32]) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    pub fn sphere(gpu: &GpuContext, radius: f32, segments: u32, rings: u32) -> Self {
        let (vertices, indices) = sphere_geometry(radius, segments, rings);
        Self::new(gpu, &vertices, &indices)
    }

    pub fn plane(gpu: &GpuContext, size: f32) -> Self {
        let (vertices, indices) = plane_geometry(size);
        Self::new(gpu, &vertices, &indices)
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass) {
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Position, rotation, and scale of an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Rotate so the local `+Y` axis (the plane normal) points at `target`.
    pub fn facing(mut self, target: Vec3) -> Self {
        let direction = (target - self.position).normalize_or(Vec3::Y);
        self.rotation = Quat::from_rotation_arc(Vec3::Y, direction);
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Inverse-transpose of the model matrix, for transforming normals.
    pub fn normal_matrix(&self) -> Mat4 {
        self.matrix().inverse().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_counts_and_radius() {
        let (vertices, indices) = sphere_geometry(1.0, 32, 16);
        assert_eq!(vertices.len(), 33 * 17);
        // Pole rows contribute one triangle per segment instead of two.
        assert_eq!(indices.len(), (32 * 16 * 2 - 2 * 32) * 3);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));

        for v in &vertices {
            let p = Vec3::from(v.position);
            assert!((p.length() - 1.0).abs() < 1e-5);
            assert!(p.normalize().dot(Vec3::from(v.normal)) > 0.999);
        }
    }

    #[test]
    fn sphere_triangles_wind_outwards() {
        let (vertices, indices) = sphere_geometry(2.0, 12, 6);
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(vertices[i as usize].position));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn plane_faces_up_and_winds_counter_clockwise() {
        let (vertices, indices) = plane_geometry(10.0);
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[2].position, [5.0, 0.0, 5.0]);
        let [a, b, c] = [indices[0], indices[1], indices[2]].map(|i| Vec3::from(vertices[i as usize].position));
        assert!((b - a).cross(c - a).y > 0.0);
    }

    #[test]
    fn facing_points_plane_normal_at_target() {
        let transform = Transform::from_position(Vec3::splat(-2.0)).facing(Vec3::ZERO);
        let normal = transform.rotation * Vec3::Y;
        assert!(normal.dot(Vec3::ONE.normalize()) > 0.9999);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let transform = Transform {
            scale: Vec3::new(2.0, 1.0, 1.0),
            ..Default::default()
        };
        let n = transform.normal_matrix().transform_vector3(Vec3::X);
        assert!((n.normalize() - Vec3::X).length() < 1e-6);
        assert!((n.length() - 0.5).abs() < 1e-6);
    }
}
