//! Scene storage and the dissolve demo scene.
//!
//! Entities live in a `hecs` world; meshes and materials are stored in the
//! scene and referenced by [`MeshId`] / [`MaterialId`]. Materials hold
//! `Rc` handles to their uniform stores, so they stay out of the world.

use glam::Vec3;

use crate::dissolve::{self, DissolveParams};
use crate::draw2d::Color;
use crate::ecs::{CastsShadow, MaterialId, MeshId, ReceivesShadow, Renderable};
use crate::error::MaterialError;
use crate::gpu::GpuContext;
use crate::material::{MaterialDescriptor, PatchedMaterial, SurfaceParams};
use crate::mesh::{Mesh, Transform};
use crate::mesh_pass::{ObjectBinding, ObjectUniforms, PassLayouts};
use crate::shadow::DirectionalLight;
use crate::sky::Environment;
use crate::uniforms::SharedUniforms;

/// Which shadow components an entity is spawned with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowFlags {
    pub cast: bool,
    pub receive: bool,
}

impl ShadowFlags {
    pub const NONE: Self = Self {
        cast: false,
        receive: false,
    };
    pub const RECEIVE: Self = Self {
        cast: false,
        receive: true,
    };
    pub const CAST_AND_RECEIVE: Self = Self {
        cast: true,
        receive: true,
    };
}

#[derive(Default)]
pub struct Scene {
    pub world: hecs::World,
    pub light: DirectionalLight,
    pub environment: Environment,
    meshes: Vec<Mesh>,
    materials: Vec<PatchedMaterial>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_material(&mut self, material: PatchedMaterial) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn material(&self, id: MaterialId) -> Option<&PatchedMaterial> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut PatchedMaterial> {
        self.materials.get_mut(id.0)
    }

    /// Spawn a drawable entity with its own object uniform buffer.
    pub fn spawn(
        &mut self,
        gpu: &GpuContext,
        layouts: &PassLayouts,
        transform: Transform,
        mesh: MeshId,
        material: MaterialId,
        shadows: ShadowFlags,
    ) -> hecs::Entity {
        let mut builder = hecs::EntityBuilder::new();
        builder.add(transform).add(Renderable {
            mesh,
            material,
            binding: ObjectBinding::new(gpu, layouts),
        });
        if shadows.cast {
            builder.add(CastsShadow);
        }
        if shadows.receive {
            builder.add(ReceivesShadow);
        }
        self.world.spawn(builder.build())
    }

    /// Write object uniforms for every entity and upload every material's
    /// uniform block.
    pub fn upload(&mut self, gpu: &GpuContext) {
        for (_, (transform, renderable, receives)) in self
            .world
            .query::<(&Transform, &Renderable, Option<&ReceivesShadow>)>()
            .iter()
        {
            let Some(material) = self.materials.get(renderable.material.0) else {
                continue;
            };
            let uniforms = ObjectUniforms::new(transform, material.surface(), receives.is_some());
            renderable.binding.write(gpu, &uniforms);
        }

        for material in &mut self.materials {
            material.upload(gpu);
        }
    }
}

/// Geometry settings for [`DissolveScene::new`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneSettings {
    pub sphere_segments: u32,
    pub sphere_rings: u32,
    pub shadow_map_size: u32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            sphere_segments: 32,
            sphere_rings: 16,
            shadow_map_size: 1024,
        }
    }
}

/// The demo: a dissolving sphere above a shadow-receiving plane under a
/// sunset sky.
pub struct DissolveScene {
    pub scene: Scene,
    /// The sphere material's uniform store, written by the panel and the clock.
    pub uniforms: SharedUniforms,
    pub sphere: hecs::Entity,
    pub plane: hecs::Entity,
}

impl DissolveScene {
    pub fn new(
        gpu: &GpuContext,
        layouts: &PassLayouts,
        params: &DissolveParams,
        settings: &SceneSettings,
    ) -> Result<Self, MaterialError> {
        let mut scene = Scene::new();
        scene.light.shadow.map_size = settings.shadow_map_size;
        scene.environment = Environment::sunset().with_blurriness(0.5);

        let uniforms = params.uniform_store()?.into_shared();
        let sphere_material = PatchedMaterial::new(
            gpu,
            layouts,
            MaterialDescriptor::new("Dissolve Sphere", dissolve::shader_patch(), uniforms.clone())
                .with_surface(SurfaceParams::default())
                .with_depth_pass(true),
        )?;
        let plane_material = PatchedMaterial::new(
            gpu,
            layouts,
            MaterialDescriptor::standard(
                "Ground Plane",
                SurfaceParams::default().with_color(Color::from_hex(0xaaaaaa)),
            ),
        )?;

        let sphere_mesh = scene.add_mesh(Mesh::sphere(
            gpu,
            1.0,
            settings.sphere_segments,
            settings.sphere_rings,
        ));
        let plane_mesh = scene.add_mesh(Mesh::plane(gpu, 10.0));
        let sphere_material = scene.add_material(sphere_material);
        let plane_material = scene.add_material(plane_material);

        let sphere = scene.spawn(
            gpu,
            layouts,
            Transform::new(),
            sphere_mesh,
            sphere_material,
            ShadowFlags::CAST_AND_RECEIVE,
        );
        let plane = scene.spawn(
            gpu,
            layouts,
            Transform::from_position(Vec3::splat(-2.0)).facing(Vec3::ZERO),
            plane_mesh,
            plane_material,
            ShadowFlags::RECEIVE,
        );

        log::info!(
            "dissolve scene ready: sphere {}x{}, shadow map {}px",
            settings.sphere_segments,
            settings.sphere_rings,
            settings.shadow_map_size
        );

        Ok(Self {
            scene,
            uniforms,
            sphere,
            plane,
        })
    }

    /// Current dissolve parameters, read back from the uniform store.
    pub fn params(&self) -> DissolveParams {
        DissolveParams::from_store(&self.uniforms.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_queries_follow_shadow_flags() {
        // GPU-free check of the component layout the passes query.
        let mut world = hecs::World::new();
        let caster = world.spawn((Transform::new(), CastsShadow, ReceivesShadow));
        let receiver = world.spawn((Transform::new(), ReceivesShadow));

        let casters: Vec<_> = world
            .query::<(&Transform, &CastsShadow)>()
            .iter()
            .map(|(e, _)| e)
            .collect();
        assert_eq!(casters, vec![caster]);

        let receivers = world.query::<&ReceivesShadow>().iter().count();
        assert_eq!(receivers, 2);
        assert!(world.get::<&CastsShadow>(receiver).is_err());
    }

    #[test]
    fn plane_faces_the_sphere() {
        let transform = Transform::from_position(Vec3::splat(-2.0)).facing(Vec3::ZERO);
        let normal = transform.rotation * Vec3::Y;
        let to_sphere = (Vec3::ZERO - transform.position).normalize();
        assert!(normal.dot(to_sphere) > 0.9999);
    }

    #[test]
    fn default_settings_match_the_demo() {
        let settings = SceneSettings::default();
        assert_eq!((settings.sphere_segments, settings.sphere_rings), (32, 16));
        assert_eq!(settings.shadow_map_size, 1024);
    }
}
