//! Named, typed shader uniforms shared between material programs.
//!
//! A [`UniformStore`] maps uniform names to [`UniformValue`]s in declaration
//! order. The same store backs every program a material compiles (colour pass
//! and depth pass), so the store is the single source of truth for parameter
//! values: it is packed into one uniform buffer per frame and both programs
//! read that buffer.
//!
//! The packed layout follows WGSL's uniform address space rules: `f32` aligns
//! to 4 bytes, `vec3<f32>` aligns to 16 and occupies 12, and the block size is
//! rounded up to 16.
//!
//! ```
//! use dissolve::{Color, UniformStore};
//!
//! let mut store = UniformStore::new()
//!     .with_time("u_time")?
//!     .with_color("u_tint", Color::WHITE)?
//!     .with_scalar("u_speed", 1.2)?;
//!
//! store.tick(2.0);
//! store.set_scalar("u_speed", 0.5);
//! assert_eq!(store.layout().size, 32);
//! # Ok::<(), dissolve::MaterialError>(())
//! ```

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::draw2d::Color;
use crate::error::MaterialError;

/// Shared handle to a store; held by the material and by anything that edits
/// parameters at runtime.
pub type SharedUniforms = Rc<RefCell<UniformStore>>;

/// The kind of value a uniform carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    /// A single float set by the user.
    Scalar,
    /// A linear RGB colour.
    Color,
    /// Elapsed seconds, advanced by [`UniformStore::tick`].
    Time,
}

impl UniformKind {
    /// WGSL type used for this kind inside the uniform block.
    pub fn wgsl_type(self) -> &'static str {
        match self {
            Self::Scalar | Self::Time => "f32",
            Self::Color => "vec3<f32>",
        }
    }

    fn align(self) -> u32 {
        match self {
            Self::Scalar | Self::Time => 4,
            Self::Color => 16,
        }
    }

    fn size(self) -> u32 {
        match self {
            Self::Scalar | Self::Time => 4,
            Self::Color => 12,
        }
    }
}

/// A typed uniform value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Color(Color),
    Time(f32),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Scalar(_) => UniformKind::Scalar,
            Self::Color(_) => UniformKind::Color,
            Self::Time(_) => UniformKind::Time,
        }
    }

    fn write_into(&self, out: &mut [u8]) {
        match *self {
            Self::Scalar(v) | Self::Time(v) => out[..4].copy_from_slice(bytemuck::bytes_of(&v)),
            Self::Color(c) => out[..12].copy_from_slice(bytemuck::cast_slice(&[c.r, c.g, c.b])),
        }
    }
}

#[derive(Clone, Debug)]
struct Uniform {
    name: String,
    value: UniformValue,
}

/// Byte placement of one uniform inside the packed block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u32,
    pub size: u32,
}

/// Packed layout of a whole store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformLayout {
    pub fields: Vec<FieldLayout>,
    /// Total block size in bytes, a multiple of 16.
    pub size: u32,
}

impl UniformLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Ordered collection of named uniforms.
#[derive(Clone, Debug, Default)]
pub struct UniformStore {
    uniforms: Vec<Uniform>,
}

impl UniformStore {
    /// Name of the WGSL struct emitted by [`UniformStore::wgsl_struct`].
    pub const STRUCT_NAME: &'static str = "MaterialUniforms";
    /// Name of the module-scope variable injected code reads uniforms through.
    pub const BINDING_NAME: &'static str = "material";

    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new uniform. Names must be unique and valid WGSL identifiers.
    pub fn declare(&mut self, name: &str, value: UniformValue) -> Result<(), MaterialError> {
        if self.index_of(name).is_some() {
            return Err(MaterialError::DuplicateUniform(name.to_string()));
        }
        self.uniforms.push(Uniform {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    pub fn with_scalar(mut self, name: &str, value: f32) -> Result<Self, MaterialError> {
        self.declare(name, UniformValue::Scalar(value))?;
        Ok(self)
    }

    pub fn with_color(mut self, name: &str, color: Color) -> Result<Self, MaterialError> {
        self.declare(name, UniformValue::Color(color))?;
        Ok(self)
    }

    pub fn with_time(mut self, name: &str) -> Result<Self, MaterialError> {
        self.declare(name, UniformValue::Time(0.0))?;
        Ok(self)
    }

    /// Wrap the store in a shared handle.
    pub fn into_shared(self) -> SharedUniforms {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.uniforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uniforms.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.index_of(name).map(|i| self.uniforms[i].value)
    }

    pub fn scalar(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            UniformValue::Scalar(v) | UniformValue::Time(v) => Some(v),
            UniformValue::Color(_) => None,
        }
    }

    pub fn color(&self, name: &str) -> Option<Color> {
        match self.get(name)? {
            UniformValue::Color(c) => Some(c),
            _ => None,
        }
    }

    /// Iterate `(name, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, UniformValue)> {
        self.uniforms.iter().map(|u| (u.name.as_str(), u.value))
    }

    /// Set a scalar uniform. Unknown names and non-scalar uniforms are ignored.
    pub fn set_scalar(&mut self, name: &str, value: f32) -> bool {
        self.assign(name, UniformValue::Scalar(value))
    }

    /// Set a colour uniform from a `0xRRGGBB` sRGB hex value.
    pub fn set_color(&mut self, name: &str, rgb_hex: u32) -> bool {
        self.set_color_value(name, Color::from_hex(rgb_hex))
    }

    /// Set a colour uniform from a linear colour.
    pub fn set_color_value(&mut self, name: &str, color: Color) -> bool {
        self.assign(name, UniformValue::Color(color))
    }

    /// Advance every time uniform to `elapsed` seconds.
    pub fn tick(&mut self, elapsed: f32) {
        for uniform in &mut self.uniforms {
            if let UniformValue::Time(t) = &mut uniform.value {
                *t = elapsed;
            }
        }
    }

    /// Compute the packed block layout.
    pub fn layout(&self) -> UniformLayout {
        let mut cursor = 0u32;
        let mut max_align = 16u32;
        let fields = self
            .uniforms
            .iter()
            .map(|u| {
                let kind = u.value.kind();
                let offset = round_up(cursor, kind.align());
                cursor = offset + kind.size();
                max_align = max_align.max(kind.align());
                FieldLayout {
                    name: u.name.clone(),
                    kind,
                    offset,
                    size: kind.size(),
                }
            })
            .collect();

        UniformLayout {
            fields,
            size: round_up(cursor, max_align).max(16),
        }
    }

    /// WGSL declaration of the block struct.
    pub fn wgsl_struct(&self) -> String {
        let mut src = format!("struct {} {{\n", Self::STRUCT_NAME);
        for uniform in &self.uniforms {
            let _ = writeln!(src, "    {}: {},", uniform.name, uniform.value.kind().wgsl_type());
        }
        src.push_str("}\n");
        src
    }

    /// WGSL struct plus the `var<uniform>` binding at `@group(group) @binding(binding)`.
    pub fn wgsl_declaration(&self, group: u32, binding: u32) -> String {
        format!(
            "{}@group({group}) @binding({binding}) var<uniform> {}: {};\n",
            self.wgsl_struct(),
            Self::BINDING_NAME,
            Self::STRUCT_NAME,
        )
    }

    /// Pack the current values into `out`, replacing its contents.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        let layout = self.layout();
        out.clear();
        out.resize(layout.size as usize, 0);
        for (uniform, field) in self.uniforms.iter().zip(&layout.fields) {
            let start = field.offset as usize;
            uniform.value.write_into(&mut out[start..start + field.size as usize]);
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|u| u.name == name)
    }

    fn assign(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(index) = self.index_of(name) else {
            log::warn!("ignoring write to unknown uniform `{name}`");
            return false;
        };
        let slot = &mut self.uniforms[index].value;
        if slot.kind() != value.kind() {
            log::warn!(
                "ignoring {:?} write to uniform `{name}` of kind {:?}",
                value.kind(),
                slot.kind()
            );
            return false;
        }
        *slot = value;
        true
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> UniformStore {
        UniformStore::new()
            .with_time("u_time")
            .and_then(|s| s.with_color("u_edge_color", Color::rgb(1.0, 0.5, 0.25)))
            .and_then(|s| s.with_color("u_middle_color", Color::WHITE))
            .and_then(|s| s.with_scalar("u_animation_speed", 1.2))
            .and_then(|s| s.with_scalar("u_noise_frequency", 1.7))
            .unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut store = sample_store();
        let err = store
            .declare("u_time", UniformValue::Scalar(0.0))
            .unwrap_err();
        assert!(matches!(err, MaterialError::DuplicateUniform(name) if name == "u_time"));
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn layout_follows_wgsl_alignment() {
        let layout = sample_store().layout();
        let offsets: Vec<u32> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 44, 48]);
        assert_eq!(layout.size, 64);
    }

    #[test]
    fn empty_store_still_has_a_minimum_block() {
        assert_eq!(UniformStore::new().layout().size, 16);
    }

    #[test]
    fn layout_matches_naga() {
        let store = sample_store();
        let source = store.wgsl_declaration(2, 0);
        let module = naga::front::wgsl::parse_str(&source).unwrap();
        let (_, ty) = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some(UniformStore::STRUCT_NAME))
            .unwrap();
        let naga::TypeInner::Struct { members, span } = &ty.inner else {
            panic!("expected a struct");
        };

        let layout = store.layout();
        assert_eq!(*span, layout.size);
        for (member, field) in members.iter().zip(&layout.fields) {
            assert_eq!(member.name.as_deref(), Some(field.name.as_str()));
            assert_eq!(member.offset, field.offset);
        }
    }

    #[test]
    fn tick_only_moves_time_uniforms() {
        let mut store = sample_store();
        store.tick(3.5);
        assert_eq!(store.get("u_time"), Some(UniformValue::Time(3.5)));
        assert_eq!(store.scalar("u_animation_speed"), Some(1.2));
    }

    #[test]
    fn mismatched_or_unknown_writes_are_ignored() {
        let mut store = sample_store();
        assert!(!store.set_scalar("u_edge_color", 2.0));
        assert!(!store.set_scalar("u_missing", 2.0));
        assert!(!store.set_color("u_animation_speed", 0xffffff));
        assert_eq!(store.scalar("u_animation_speed"), Some(1.2));
        assert_eq!(store.color("u_edge_color"), Some(Color::rgb(1.0, 0.5, 0.25)));
    }

    #[test]
    fn set_color_converts_hex_to_linear() {
        let mut store = sample_store();
        assert!(store.set_color("u_middle_color", 0xff0000));
        assert_eq!(store.color("u_middle_color"), Some(Color::rgb(1.0, 0.0, 0.0)));
    }

    #[test]
    fn write_bytes_places_values_at_their_offsets() {
        let mut store = sample_store();
        store.tick(2.0);
        let mut bytes = Vec::new();
        store.write_bytes(&mut bytes);
        assert_eq!(bytes.len(), 64);

        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(floats[0], 2.0);
        assert_eq!(&floats[4..7], &[1.0, 0.5, 0.25]);
        assert_eq!(&floats[8..11], &[1.0, 1.0, 1.0]);
        assert_eq!(floats[11], 1.2);
        assert_eq!(floats[12], 1.7);
    }
}
