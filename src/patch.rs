//! Shader patching: splice custom WGSL into a built-in base shading model.
//!
//! Each [`BaseModel`] is a complete WGSL program containing `#include <name>`
//! marker lines. Every marker is a [`PatchPoint`] published in the model's
//! registry along with the stage it runs in and the local variables injected
//! code may read or write there.
//!
//! An override is not pasted into the host function. It becomes the body of a
//! generated `patch_<point>` helper whose parameters are exactly the exposed
//! locals (read-only ones by value, writable ones through a function pointer),
//! and the marker becomes a call to it. Any other local of the host function is
//! out of scope, so naga rejects code that reaches past its hook, and an
//! override valid at a point both models publish is valid in both. Helpers
//! write their locals back on exit, so an override must not `return`;
//! `discard` is fine.
//!
//! [`compile`] assembles a module from four parts:
//!
//! 1. the uniform block of the material's [`UniformStore`] (group 2),
//! 2. the base model template with every marker replaced, either by a call
//!    to the helper holding the [`PatchMap`] override for that point or by
//!    the model's default chunk, followed by those helpers,
//! 3. the patch's vertex-stage module-scope source,
//! 4. the patch's fragment-stage module-scope source.
//!
//! The result is parsed and validated with naga before it ever reaches the
//! GPU. Keys in the patch map that the model does not publish are rejected
//! up front with [`MaterialError::PatchPointNotFound`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::MaterialError;
use crate::uniforms::UniformStore;

/// Bind group index of the material uniform block.
pub const MATERIAL_GROUP: u32 = 2;

const COMMON_SOURCE: &str = include_str!("shaders/common.wgsl");
const STANDARD_SOURCE: &str = include_str!("shaders/standard.wgsl");
const DEPTH_SOURCE: &str = include_str!("shaders/depth.wgsl");

/// Shader stage a patch point lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Whether injected code may assign an exposed local.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

/// A host-function local handed to injected code.
#[derive(Clone, Copy, Debug)]
pub struct PatchVar {
    pub name: &'static str,
    /// WGSL type of the local.
    pub ty: &'static str,
    pub access: Access,
}

const fn read(name: &'static str, ty: &'static str) -> PatchVar {
    PatchVar {
        name,
        ty,
        access: Access::Read,
    }
}

const fn read_write(name: &'static str, ty: &'static str) -> PatchVar {
    PatchVar {
        name,
        ty,
        access: Access::ReadWrite,
    }
}

impl PatchVar {
    fn parameter(&self) -> String {
        match self.access {
            Access::Read => format!("{}: {}", self.name, self.ty),
            Access::ReadWrite => format!("{}_io: ptr<function, {}>", self.name, self.ty),
        }
    }

    fn argument(&self) -> String {
        match self.access {
            Access::Read => self.name.to_string(),
            Access::ReadWrite => format!("&{}", self.name),
        }
    }
}

/// A named injection site inside a base model.
#[derive(Clone, Copy, Debug)]
pub struct PatchPoint {
    pub name: &'static str,
    pub stage: ShaderStage,
    /// The only locals injected code can see at this marker.
    pub exposes: &'static [PatchVar],
    /// Code used when the patch map does not override this point.
    pub default_chunk: &'static str,
}

const BEGIN_VERTEX: PatchPoint = PatchPoint {
    name: "begin_vertex",
    stage: ShaderStage::Vertex,
    exposes: &[
        read("input", "VertexInput"),
        read_write("transformed", "vec3<f32>"),
        read_write("object_normal", "vec3<f32>"),
    ],
    default_chunk: "// begin_vertex: object-space position unchanged",
};

const SURFACE_FRAGMENT: PatchPoint = PatchPoint {
    name: "surface_fragment",
    stage: ShaderStage::Fragment,
    exposes: &[
        read("in", "VertexOutput"),
        read_write("normal", "vec3<f32>"),
        read_write("diffuse_color", "vec4<f32>"),
        read_write("metalness", "f32"),
        read_write("roughness", "f32"),
        read_write("emissive", "vec3<f32>"),
    ],
    default_chunk: "// surface_fragment: material inputs unchanged",
};

const OUTPUT_FRAGMENT: PatchPoint = PatchPoint {
    name: "output_fragment",
    stage: ShaderStage::Fragment,
    exposes: &[read("in", "VertexOutput"), read_write("out_color", "vec4<f32>")],
    default_chunk: "// output_fragment: final colour unchanged",
};

const STANDARD_POINTS: &[PatchPoint] = &[BEGIN_VERTEX, SURFACE_FRAGMENT, OUTPUT_FRAGMENT];
const DEPTH_POINTS: &[PatchPoint] = &[BEGIN_VERTEX, OUTPUT_FRAGMENT];

/// Built-in shading model a patch is applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseModel {
    /// Lit PBR surface rendered into the HDR colour target.
    Standard,
    /// Depth-only surface rendered into the shadow map.
    Depth,
}

impl BaseModel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Depth => "depth",
        }
    }

    /// Registry of injection sites this model publishes.
    pub fn patch_points(self) -> &'static [PatchPoint] {
        match self {
            Self::Standard => STANDARD_POINTS,
            Self::Depth => DEPTH_POINTS,
        }
    }

    pub fn patch_point(self, name: &str) -> Option<&'static PatchPoint> {
        self.patch_points().iter().find(|p| p.name == name)
    }

    pub fn has_patch_point(self, name: &str) -> bool {
        self.patch_point(name).is_some()
    }

    fn template(self) -> &'static str {
        match self {
            Self::Standard => STANDARD_SOURCE,
            Self::Depth => DEPTH_SOURCE,
        }
    }
}

impl PatchPoint {
    /// Name of the generated helper holding this point's override.
    pub fn helper_name(&self) -> String {
        format!("patch_{}", self.name)
    }

    fn call(&self) -> String {
        let arguments: Vec<String> = self.exposes.iter().map(PatchVar::argument).collect();
        format!("{}({});", self.helper_name(), arguments.join(", "))
    }

    /// Wrap `body` in a function that only sees the exposed locals.
    fn helper(&self, body: &str) -> String {
        let parameters: Vec<String> = self.exposes.iter().map(PatchVar::parameter).collect();
        let writable = self.exposes.iter().filter(|v| v.access == Access::ReadWrite);

        let mut out = format!("fn {}({}) {{\n", self.helper_name(), parameters.join(", "));
        for var in writable.clone() {
            out.push_str(&format!("    var {0} = *{0}_io;\n", var.name));
        }
        push_indented(&mut out, &dedent(body), "    ");
        for var in writable {
            out.push_str(&format!("    *{0}_io = {0};\n", var.name));
        }
        out.push_str("}\n");
        out
    }
}

impl fmt::Display for BaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Replacement source per patch point. Iterates in name order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchMap {
    entries: BTreeMap<String, String>,
}

impl PatchMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`PatchMap::insert`].
    pub fn with(mut self, point: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(point, source);
        self
    }

    /// Set the replacement for `point`, returning the previous one.
    pub fn insert(&mut self, point: impl Into<String>, source: impl Into<String>) -> Option<String> {
        self.entries.insert(point.into(), source.into())
    }

    pub fn get(&self, point: &str) -> Option<&str> {
        self.entries.get(point).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Custom code applied on top of a base model.
///
/// `vertex` and `fragment` hold module-scope WGSL (functions, constants,
/// structs) for their stage. They take effect through calls placed at patch
/// points by the [`PatchMap`].
#[derive(Clone, Debug, Default)]
pub struct ShaderPatch {
    pub vertex: String,
    pub fragment: String,
    pub patch_map: PatchMap,
}

impl ShaderPatch {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            patch_map: PatchMap::new(),
        }
    }

    pub fn with_patch_map(mut self, patch_map: PatchMap) -> Self {
        self.patch_map = patch_map;
        self
    }
}

/// A complete, validated WGSL module produced by [`compile`].
#[derive(Clone, Debug)]
pub struct PatchedShader {
    model: BaseModel,
    label: String,
    source: String,
}

impl PatchedShader {
    pub fn model(&self) -> BaseModel {
        self.model
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse and validate the module with naga.
    pub fn validate(&self) -> Result<naga::Module, MaterialError> {
        validate_wgsl(&self.label, &self.source)
    }
}

/// Splice `patch` into `model`, declaring `uniforms` as the material block.
pub fn compile(
    model: BaseModel,
    patch: &ShaderPatch,
    uniforms: &UniformStore,
    label: &str,
) -> Result<PatchedShader, MaterialError> {
    for (point, _) in patch.patch_map.iter() {
        if !model.has_patch_point(point) {
            return Err(MaterialError::PatchPointNotFound {
                point: point.to_string(),
                model: model.name(),
            });
        }
    }

    let label = format!("{label} ({model})");
    let mut source = format!("// {label}\n\n");
    if !uniforms.is_empty() {
        source.push_str(&uniforms.wgsl_declaration(MATERIAL_GROUP, 0));
        source.push('\n');
    }
    source.push_str(COMMON_SOURCE);
    source.push('\n');
    source.push_str(&expand_includes(model, &patch.patch_map, &label)?);
    if !patch.vertex.is_empty() {
        source.push_str("\n// vertex patch\n");
        source.push_str(&patch.vertex);
    }
    if !patch.fragment.is_empty() {
        source.push_str("\n// fragment patch\n");
        source.push_str(&patch.fragment);
    }

    let shader = PatchedShader {
        model,
        label,
        source,
    };
    shader.validate()?;
    log::debug!(
        "compiled `{}` with {} patched point(s)",
        shader.label,
        patch.patch_map.len()
    );
    Ok(shader)
}

/// Compile an unpatched WGSL program that shares the scene declarations
/// (frame block, sky environment) with the base models.
pub fn compile_scene_program(label: &str, body: &str) -> Result<String, MaterialError> {
    let source = format!("// {label}\n\n{COMMON_SOURCE}\n{body}");
    validate_wgsl(label, &source)?;
    Ok(source)
}

fn expand_includes(
    model: BaseModel,
    patch_map: &PatchMap,
    label: &str,
) -> Result<String, MaterialError> {
    let mut out = String::with_capacity(model.template().len() + 256);
    let mut helpers = String::new();
    for line in model.template().lines() {
        let Some(name) = include_name(line) else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        let point = model
            .patch_point(name)
            .ok_or_else(|| MaterialError::ShaderCompile {
                label: label.to_string(),
                diagnostic: format!("template includes unregistered chunk `{name}`"),
            })?;
        let indent = &line[..line.len() - line.trim_start().len()];
        match patch_map.get(name) {
            Some(chunk) => {
                out.push_str(indent);
                out.push_str(&point.call());
                out.push('\n');
                helpers.push('\n');
                helpers.push_str(&point.helper(chunk));
            }
            None => push_indented(&mut out, point.default_chunk, indent),
        }
    }
    out.push_str(&helpers);
    Ok(out)
}

fn push_indented(out: &mut String, chunk: &str, indent: &str) {
    for chunk_line in chunk.lines() {
        if !chunk_line.trim().is_empty() {
            out.push_str(indent);
        }
        out.push_str(chunk_line);
        out.push('\n');
    }
}

/// Strip the indentation shared by every non-blank line.
fn dedent(chunk: &str) -> String {
    let common = chunk
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    chunk
        .lines()
        .map(|line| line.get(common..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn include_name(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("#include <")?
        .strip_suffix('>')
        .map(str::trim)
}

fn validate_wgsl(label: &str, source: &str) -> Result<naga::Module, MaterialError> {
    let module =
        naga::front::wgsl::parse_str(source).map_err(|err| MaterialError::ShaderCompile {
            label: label.to_string(),
            diagnostic: err.emit_to_string(source),
        })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| MaterialError::ShaderCompile {
        label: label.to_string(),
        diagnostic: err.emit_to_string(source),
    })?;

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw2d::Color;

    fn store() -> UniformStore {
        UniformStore::new()
            .with_time("u_time")
            .and_then(|s| s.with_color("u_tint", Color::WHITE))
            .unwrap()
    }

    fn entry_points(module: &naga::Module) -> Vec<(&str, naga::ShaderStage)> {
        module
            .entry_points
            .iter()
            .map(|ep| (ep.name.as_str(), ep.stage))
            .collect()
    }

    #[test]
    fn unpatched_models_validate() {
        for model in [BaseModel::Standard, BaseModel::Depth] {
            let shader = compile(model, &ShaderPatch::default(), &UniformStore::new(), "plain")
                .unwrap_or_else(|e| panic!("{model}: {e}"));
            assert!(!shader.source().contains("#include"));
            assert!(!shader.source().contains("MaterialUniforms"));

            let module = shader.validate().unwrap();
            let stages = entry_points(&module);
            assert!(stages.contains(&("vs", naga::ShaderStage::Vertex)));
            assert!(stages.contains(&("fs", naga::ShaderStage::Fragment)));
        }
    }

    #[test]
    fn every_marker_is_registered() {
        for model in [BaseModel::Standard, BaseModel::Depth] {
            let markers: Vec<&str> = model.template().lines().filter_map(include_name).collect();
            assert_eq!(markers.len(), model.patch_points().len(), "{model}");
            for name in markers {
                assert!(model.has_patch_point(name), "{model} is missing {name}");
            }
        }
    }

    #[test]
    fn depth_model_has_no_surface_hook() {
        assert!(BaseModel::Standard.has_patch_point("surface_fragment"));
        assert!(!BaseModel::Depth.has_patch_point("surface_fragment"));
        assert_eq!(
            BaseModel::Depth.patch_point("begin_vertex").map(|p| p.stage),
            Some(ShaderStage::Vertex)
        );
    }

    #[test]
    fn unknown_patch_point_is_rejected() {
        let patch = ShaderPatch::default()
            .with_patch_map(PatchMap::new().with("colorspace_fragment", "out_color = vec4<f32>(1.0);"));
        let err = compile(BaseModel::Standard, &patch, &store(), "bad").unwrap_err();
        assert!(matches!(
            err,
            MaterialError::PatchPointNotFound { ref point, model: "standard" } if point == "colorspace_fragment"
        ));
    }

    #[test]
    fn surface_hook_is_rejected_by_depth_model() {
        let patch = ShaderPatch::default()
            .with_patch_map(PatchMap::new().with("surface_fragment", "roughness = 1.0;"));
        assert!(compile(BaseModel::Standard, &patch, &store(), "ok").is_ok());
        assert!(matches!(
            compile(BaseModel::Depth, &patch, &store(), "bad"),
            Err(MaterialError::PatchPointNotFound { model: "depth", .. })
        ));
    }

    #[test]
    fn override_becomes_helper_called_at_marker() {
        let patch = ShaderPatch::new(
            "",
            "fn tint() -> vec3<f32> { return material.u_tint * (1.0 + material.u_time); }",
        )
        .with_patch_map(
            PatchMap::new().with("output_fragment", "out_color = vec4<f32>(tint(), 1.0);"),
        );

        let shader = compile(BaseModel::Standard, &patch, &store(), "tinted").unwrap();
        let source = shader.source();
        assert!(source.contains("\n    patch_output_fragment(in, &out_color);\n"));
        assert!(source.contains(
            "fn patch_output_fragment(in: VertexOutput, out_color_io: ptr<function, vec4<f32>>) {\n\
             \x20   var out_color = *out_color_io;\n\
             \x20   out_color = vec4<f32>(tint(), 1.0);\n\
             \x20   *out_color_io = out_color;\n\
             }\n"
        ));
        assert!(!source.contains(OUTPUT_FRAGMENT.default_chunk));
        assert!(source.contains(&format!("\n    {}\n", BEGIN_VERTEX.default_chunk)));
        assert!(!source.contains("fn patch_begin_vertex"));
        assert!(source.contains("struct MaterialUniforms"));
        assert_eq!(shader.label(), "tinted (standard)");
    }

    #[test]
    fn override_indentation_is_normalised() {
        let patch = ShaderPatch::default().with_patch_map(PatchMap::new().with(
            "output_fragment",
            "        if (out_color.a < 0.5) {\n            discard;\n        }",
        ));
        let shader = compile(BaseModel::Depth, &patch, &store(), "cutout").unwrap();
        assert!(shader.source().contains("\n    if (out_color.a < 0.5) {\n        discard;\n    }\n"));
    }

    #[test]
    fn hidden_locals_are_out_of_scope() {
        // `normal` and `roughness` live in the standard fragment function but
        // are only exposed at `surface_fragment`.
        let patch = ShaderPatch::default().with_patch_map(
            PatchMap::new().with("output_fragment", "out_color = vec4<f32>(normal * roughness, 1.0);"),
        );
        for model in [BaseModel::Standard, BaseModel::Depth] {
            assert!(
                matches!(
                    compile(model, &patch, &store(), "leaky"),
                    Err(MaterialError::ShaderCompile { .. })
                ),
                "{model} accepted a local it does not expose"
            );
        }

        let vertex = ShaderPatch::default()
            .with_patch_map(PatchMap::new().with("begin_vertex", "transformed = world.xyz;"));
        assert!(compile(BaseModel::Standard, &vertex, &store(), "early").is_err());
    }

    #[test]
    fn exposed_locals_are_writable() {
        let patch = ShaderPatch::default().with_patch_map(
            PatchMap::new()
                .with(
                    "begin_vertex",
                    "transformed = transformed + object_normal * 0.1;\n\
                     object_normal = -object_normal;",
                )
                .with(
                    "surface_fragment",
                    "roughness = 1.0;\n\
                     metalness = 0.0;\n\
                     emissive = in.object_position;\n\
                     diffuse_color = vec4<f32>(normal, 1.0);",
                )
                .with("output_fragment", "out_color = vec4<f32>(in.uv, 0.0, 1.0);"),
        );
        let shader = compile(BaseModel::Standard, &patch, &store(), "writes").unwrap();
        let source = shader.source();
        assert!(source.contains(
            "    patch_surface_fragment(in, &normal, &diffuse_color, &metalness, &roughness, &emissive);"
        ));
        assert!(source.contains("    *roughness_io = roughness;"));
        assert!(source.contains(
            "fn patch_begin_vertex(input: VertexInput, transformed_io: ptr<function, vec3<f32>>, \
             object_normal_io: ptr<function, vec3<f32>>)"
        ));

        let module = shader.validate().unwrap();
        let helpers: Vec<&str> = module
            .functions
            .iter()
            .filter_map(|(_, f)| f.name.as_deref())
            .filter(|name| name.starts_with("patch_"))
            .collect();
        assert_eq!(helpers.len(), 3, "{helpers:?}");
    }

    #[test]
    fn read_only_locals_cannot_be_assigned() {
        let patch = ShaderPatch::default().with_patch_map(
            PatchMap::new().with("output_fragment", "in.uv = vec2<f32>(0.0);"),
        );
        assert!(matches!(
            compile(BaseModel::Depth, &patch, &store(), "readonly"),
            Err(MaterialError::ShaderCompile { .. })
        ));
    }

    #[test]
    fn helper_names_follow_points() {
        assert_eq!(OUTPUT_FRAGMENT.helper_name(), "patch_output_fragment");
        assert_eq!(OUTPUT_FRAGMENT.call(), "patch_output_fragment(in, &out_color);");
        assert_eq!(dedent("  a\n    b\n\n  c"), "a\n  b\n\nc");
    }

    #[test]
    fn broken_injection_reports_compile_error() {
        let patch = ShaderPatch::default()
            .with_patch_map(PatchMap::new().with("output_fragment", "out_color = undefined_value;"));
        let err = compile(BaseModel::Standard, &patch, &store(), "broken").unwrap_err();
        match err {
            MaterialError::ShaderCompile { label, diagnostic } => {
                assert_eq!(label, "broken (standard)");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn type_errors_are_caught_by_validation() {
        let patch = ShaderPatch::default()
            .with_patch_map(PatchMap::new().with("begin_vertex", "transformed = material.u_time;"));
        assert!(matches!(
            compile(BaseModel::Depth, &patch, &store(), "mistyped"),
            Err(MaterialError::ShaderCompile { .. })
        ));
    }

    #[test]
    fn scene_programs_share_common_declarations() {
        let source = compile_scene_program("sky", include_str!("shaders/sky.wgsl")).unwrap();
        assert!(source.contains("fn environment_radiance"));
        assert!(compile_scene_program("broken", "fn fs() -> f32 { return missing; }").is_err());
    }
}
