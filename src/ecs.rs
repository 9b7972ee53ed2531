//! Components attached to scene entities.
//!
//! An entity is drawn when it has a [`Transform`](crate::Transform) and a
//! [`Renderable`]. [`CastsShadow`] adds it to the shadow pass, which draws it
//! with its material's depth program; [`ReceivesShadow`] makes its colour
//! program sample the shadow map.

use crate::mesh_pass::ObjectBinding;

/// Index of a mesh owned by a [`Scene`](crate::Scene).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Index of a material owned by a [`Scene`](crate::Scene).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

/// Drawable attachment: geometry, material, and the entity's own uniforms.
pub struct Renderable {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub(crate) binding: ObjectBinding,
}

/// Marker: render into the shadow map.
#[derive(Clone, Copy, Debug, Default)]
pub struct CastsShadow;

/// Marker: sample the shadow map when shading.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReceivesShadow;
