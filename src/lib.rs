//! # Dissolve
//!
//! **A noise-driven dissolve effect spliced into standard materials.**
//!
//! A sphere materialises out of 3D simplex noise under a sunset sky: fragments
//! whose noise is still above the moving threshold are discarded, a thin band
//! just below it glows between two rim colours, and everything else shades as
//! a plain PBR surface. The same injected code runs in the shadow pass, so the
//! shadow on the ground plane follows the visible silhouette.
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> Result<(), dissolve::AppError> {
//!     dissolve::run(dissolve::AppConfig::from_env().title("Dissolve"))
//! }
//! ```
//!
//! ## Patching your own material
//!
//! ```no_run
//! use dissolve::patch::{BaseModel, PatchMap, ShaderPatch, compile};
//! use dissolve::uniforms::UniformStore;
//!
//! # fn main() -> Result<(), dissolve::MaterialError> {
//! let uniforms = UniformStore::new().with_time("u_time")?.with_scalar("u_strength", 0.5)?;
//! let patch = ShaderPatch::new("", "").with_patch_map(
//!     PatchMap::new().with(
//!         "output_fragment",
//!         "out_color = vec4<f32>(out_color.rgb * material.u_strength, out_color.a);",
//!     ),
//! );
//! let shader = compile(BaseModel::Standard, &patch, &uniforms, "tinted")?;
//! # let _ = shader;
//! # Ok(())
//! # }
//! ```
//!
//! The uniform store is shared through [`SharedUniforms`]; both the colour
//! and depth programs of a [`PatchedMaterial`] read the same GPU buffer, so a
//! write is seen by both passes on the next frame.

mod app;
mod assets;
mod camera;
pub mod dissolve;
mod draw2d;
mod ecs;
mod error;
mod gpu;
mod input;
mod material;
mod mesh;
mod mesh_pass;
mod noise;
mod orbit_camera;
mod panel;
pub mod patch;
mod post_process;
mod renderer;
pub mod scene;
mod shadow;
mod sky;
pub mod uniforms;

pub use app::{AppConfig, FrameClock, run};
pub use assets::{Assets, FontAtlas, FontId};
pub use camera::Camera;
pub use dissolve::{Coverage, DissolveParams, DissolvePreset, PRESETS};
pub use draw2d::{Color, Draw2d, Rect};
pub use error::{AppError, MaterialError};
pub use gpu::GpuContext;
pub use input::Input;
pub use material::{MaterialDescriptor, MaterialProgram, PatchedMaterial, SurfaceParams, Variant};
pub use mesh::{Mesh, Transform, Vertex3d};
pub use mesh_pass::{MeshPass, PassLayouts};
pub use noise::simplex3;
pub use orbit_camera::OrbitCamera;
pub use panel::{
    ColorParam, Control, ParamChange, ParameterDefaults, ParameterPanel, ScalarParam, SliderRange,
};
pub use post_process::{Bloom, BloomSettings, RenderTarget};
pub use renderer::Renderer;
pub use scene::{DissolveScene, Scene, SceneSettings, ShadowFlags};
pub use shadow::{DirectionalLight, ShadowMap, ShadowSettings};
pub use sky::{Environment, SkyPass};
pub use uniforms::{SharedUniforms, UniformKind, UniformStore, UniformValue};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

// ECS support and type-safe handles
pub use ecs::{CastsShadow, MaterialId, MeshId, ReceivesShadow, Renderable};
pub use hecs::{Entity, World};
