//! The dissolve material.
//!
//! Every fragment samples 3D simplex noise at its object-space position and
//! compares it against a threshold that grows linearly with time:
//!
//! * `noise > threshold`: not yet materialised, discarded,
//! * `threshold - EDGE_WIDTH <= noise <= threshold`: the glowing rim, the lit
//!   colour plus an emissive blend from the edge colour (outer side of the
//!   band) to the middle colour (at the threshold),
//! * below that: fully revealed, lit normally.
//!
//! The reveal is one-way; restarting the clock is the only way to replay it.
//! The same WGSL (`shaders/dissolve/*.wgsl`) is injected into the colour and
//! the depth program so the shadow follows the visible surface. The Rust
//! functions here are the CPU reference for that WGSL.

use glam::Vec3;

use crate::draw2d::Color;
use crate::error::MaterialError;
use crate::noise::simplex3;
use crate::patch::{PatchMap, ShaderPatch};
use crate::uniforms::UniformStore;

/// Width of the glowing band in noise units.
pub const EDGE_WIDTH: f32 = 0.05;

pub const U_TIME: &str = "u_time";
pub const U_EDGE_COLOR: &str = "u_edge_color";
pub const U_MIDDLE_COLOR: &str = "u_middle_color";
pub const U_ANIMATION_SPEED: &str = "u_animation_speed";
pub const U_NOISE_FREQUENCY: &str = "u_noise_frequency";

pub const VERTEX_SOURCE: &str = include_str!("shaders/dissolve/vertex.wgsl");
pub const FRAGMENT_SOURCE: &str = include_str!("shaders/dissolve/fragment.wgsl");
/// Replacement for the `output_fragment` patch point.
pub const OUTPUT_CHUNK: &str = include_str!("shaders/dissolve/output.wgsl");
/// Replacement for the `begin_vertex` patch point.
pub const BEGIN_VERTEX_CHUNK: &str = "transformed = dissolve_displace(transformed, object_normal);";

/// A named pair of rim colours as sRGB hex values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DissolvePreset {
    pub name: &'static str,
    pub edge: u32,
    pub middle: u32,
}

pub const PRESETS: &[DissolvePreset] = &[
    DissolvePreset {
        name: "Ember",
        edge: 0xeb5a39,
        middle: 0xf2c7b4,
    },
    DissolvePreset {
        name: "Amber",
        edge: 0xffa600,
        middle: 0xfff1c1,
    },
    DissolvePreset {
        name: "Arcane",
        edge: 0x7b2ff7,
        middle: 0xd9c4ff,
    },
    DissolvePreset {
        name: "Toxic",
        edge: 0x3ad13a,
        middle: 0xd7ffb0,
    },
    DissolvePreset {
        name: "Frost",
        edge: 0x3aa0ff,
        middle: 0xe0f4ff,
    },
];

/// Per-fragment result of the dissolve test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Coverage {
    Discard,
    /// Inside the rim; carries the emissive colour added to the lit colour.
    Edge(Color),
    PassThrough,
}

/// Normalised dissolve noise in `[0, 1]` at an object-space position.
pub fn noise(position: Vec3, frequency: f32) -> f32 {
    0.5 + 0.5 * simplex3(position * frequency)
}

pub fn threshold(animation_speed: f32, elapsed: f32) -> f32 {
    animation_speed * elapsed
}

/// Rim colour at `noise`: `edge` at `threshold - EDGE_WIDTH`, `middle` at
/// `threshold`.
pub fn edge_blend(noise: f32, threshold: f32, edge: Color, middle: Color) -> Color {
    let t = ((noise - (threshold - EDGE_WIDTH)) / EDGE_WIDTH).clamp(0.0, 1.0);
    edge.lerp(middle, t)
}

/// Evenly spread points on the unit sphere (Fibonacci lattice).
pub fn sphere_samples(count: usize) -> impl Iterator<Item = Vec3> {
    let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    (0..count).map(move |i| {
        let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
        let radius = (1.0 - y * y).max(0.0).sqrt();
        let theta = golden * i as f32;
        Vec3::new(radius * theta.cos(), y, radius * theta.sin())
    })
}

/// User-facing dissolve parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DissolveParams {
    /// sRGB hex colour at the outer side of the rim.
    pub edge_color: u32,
    /// sRGB hex colour at the threshold.
    pub middle_color: u32,
    pub animation_speed: f32,
    pub noise_frequency: f32,
}

impl Default for DissolveParams {
    fn default() -> Self {
        let ember = PRESETS[0];
        Self {
            edge_color: ember.edge,
            middle_color: ember.middle,
            animation_speed: 1.2,
            noise_frequency: 1.7,
        }
    }
}

impl DissolveParams {
    pub fn with_preset(self, preset: &DissolvePreset) -> Self {
        Self {
            edge_color: preset.edge,
            middle_color: preset.middle,
            ..self
        }
    }

    /// Read parameters back from a store built by [`DissolveParams::uniform_store`].
    /// Missing entries keep their defaults.
    pub fn from_store(store: &UniformStore) -> Self {
        let defaults = Self::default();
        Self {
            edge_color: store
                .color(U_EDGE_COLOR)
                .map_or(defaults.edge_color, Color::to_hex),
            middle_color: store
                .color(U_MIDDLE_COLOR)
                .map_or(defaults.middle_color, Color::to_hex),
            animation_speed: store
                .scalar(U_ANIMATION_SPEED)
                .unwrap_or(defaults.animation_speed),
            noise_frequency: store
                .scalar(U_NOISE_FREQUENCY)
                .unwrap_or(defaults.noise_frequency),
        }
    }

    /// Store declaring every uniform the dissolve WGSL reads.
    pub fn uniform_store(&self) -> Result<UniformStore, MaterialError> {
        UniformStore::new()
            .with_time(U_TIME)?
            .with_color(U_EDGE_COLOR, Color::from_hex(self.edge_color))?
            .with_color(U_MIDDLE_COLOR, Color::from_hex(self.middle_color))?
            .with_scalar(U_ANIMATION_SPEED, self.animation_speed)?
            .with_scalar(U_NOISE_FREQUENCY, self.noise_frequency)
    }

    pub fn threshold(&self, elapsed: f32) -> f32 {
        threshold(self.animation_speed, elapsed)
    }

    /// Classify a fragment by its noise value against `threshold`.
    pub fn classify(&self, noise: f32, threshold: f32) -> Coverage {
        if noise > threshold {
            Coverage::Discard
        } else if noise >= threshold - EDGE_WIDTH {
            Coverage::Edge(edge_blend(
                noise,
                threshold,
                Color::from_hex(self.edge_color),
                Color::from_hex(self.middle_color),
            ))
        } else {
            Coverage::PassThrough
        }
    }

    /// Classify the fragment at object-space `position` after `elapsed` seconds.
    pub fn evaluate(&self, position: Vec3, elapsed: f32) -> Coverage {
        self.classify(noise(position, self.noise_frequency), self.threshold(elapsed))
    }

    /// Fraction of `samples` points on the unit sphere that are visible.
    pub fn revealed_fraction(&self, elapsed: f32, samples: usize) -> f32 {
        if samples == 0 {
            return 0.0;
        }
        let visible = sphere_samples(samples)
            .filter(|&p| self.evaluate(p, elapsed) != Coverage::Discard)
            .count();
        visible as f32 / samples as f32
    }
}

/// The dissolve injection: noise and threshold functions plus the calls
/// placed at `begin_vertex` and `output_fragment`.
pub fn shader_patch() -> ShaderPatch {
    ShaderPatch::new(VERTEX_SOURCE, FRAGMENT_SOURCE).with_patch_map(
        PatchMap::new()
            .with("begin_vertex", BEGIN_VERTEX_CHUNK)
            .with("output_fragment", OUTPUT_CHUNK),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{BaseModel, compile};

    const SAMPLES: usize = 512;

    fn close(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-5 && (a.g - b.g).abs() < 1e-5 && (a.b - b.b).abs() < 1e-5
    }

    #[test]
    fn noise_is_deterministic_and_normalised() {
        for p in sphere_samples(SAMPLES) {
            let n = noise(p, 1.7);
            assert_eq!(n, noise(p, 1.7));
            assert!((-0.03..=1.03).contains(&n), "{n}");
        }
    }

    #[test]
    fn threshold_is_monotonic() {
        let params = DissolveParams::default();
        let mut last = params.threshold(0.0);
        for i in 1..100 {
            let next = params.threshold(i as f32 * 0.25);
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn edge_blend_is_continuous_at_both_ends() {
        let edge = Color::from_hex(0xeb5a39);
        let middle = Color::from_hex(0xf2c7b4);
        let th = 0.6;

        assert!(close(edge_blend(th, th, edge, middle), middle));
        assert!(close(edge_blend(th - EDGE_WIDTH, th, edge, middle), edge));

        let inside = edge_blend(th - EDGE_WIDTH * 0.5, th, edge, middle);
        assert!(close(inside, edge.lerp(middle, 0.5)));
    }

    #[test]
    fn classification_bands() {
        let params = DissolveParams::default();
        let th = 0.5;
        assert_eq!(params.classify(0.51, th), Coverage::Discard);
        assert!(matches!(params.classify(0.5, th), Coverage::Edge(_)));
        assert!(matches!(params.classify(0.46, th), Coverage::Edge(_)));
        assert_eq!(params.classify(0.44, th), Coverage::PassThrough);

        let Coverage::Edge(rim) = params.classify(th, th) else {
            panic!("expected rim at the threshold");
        };
        assert!(close(rim, Color::from_hex(params.middle_color)));
    }

    #[test]
    fn nothing_is_visible_at_start() {
        let params = DissolveParams::default();
        assert!(sphere_samples(SAMPLES).all(|p| params.evaluate(p, 0.0) == Coverage::Discard));
        assert_eq!(params.revealed_fraction(0.0, SAMPLES), 0.0);
    }

    #[test]
    fn fully_revealed_after_ten_seconds() {
        let params = DissolveParams::default();
        assert!((params.threshold(10.0) - 12.0).abs() < 1e-5);
        assert!(sphere_samples(SAMPLES).all(|p| params.evaluate(p, 10.0) == Coverage::PassThrough));
        assert_eq!(params.revealed_fraction(10.0, SAMPLES), 1.0);
    }

    #[test]
    fn reveal_only_grows() {
        let params = DissolveParams::default();
        let fractions: Vec<f32> = (0..=20)
            .map(|i| params.revealed_fraction(i as f32 * 0.05, SAMPLES))
            .collect();
        assert!(fractions.windows(2).all(|w| w[1] >= w[0]));
        assert!(fractions[10] > 0.0 && fractions[10] < 1.0);
    }

    #[test]
    fn zero_speed_never_reveals() {
        let params = DissolveParams {
            animation_speed: 0.0,
            ..Default::default()
        };
        assert_eq!(params.revealed_fraction(100.0, SAMPLES), 0.0);
    }

    #[test]
    fn store_round_trips_params() {
        let params = DissolveParams::default().with_preset(&PRESETS[2]);
        let store = params.uniform_store().unwrap();
        assert_eq!(DissolveParams::from_store(&store), params);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn wgsl_band_width_matches() {
        assert!(FRAGMENT_SOURCE.contains(&format!("const DISSOLVE_EDGE_WIDTH: f32 = {EDGE_WIDTH};")));
    }

    /// `dissolve_fragment`'s IR with module-level handles replaced by names,
    /// so the same function compiled into different modules compares equal.
    fn dissolve_fragment_ir(module: &naga::Module) -> Vec<String> {
        let (_, function) = module
            .functions
            .iter()
            .find(|(_, f)| f.name.as_deref() == Some("dissolve_fragment"))
            .unwrap();
        let type_name = |ty: naga::Handle<naga::Type>| {
            let ty = &module.types[ty];
            ty.name.clone().unwrap_or_else(|| format!("{:?}", ty.inner))
        };

        let mut ir: Vec<String> = function
            .expressions
            .iter()
            .map(|(_, expr)| match *expr {
                naga::Expression::GlobalVariable(h) => {
                    format!("global {:?}", module.global_variables[h].name)
                }
                naga::Expression::Constant(h) => format!("const {:?}", module.constants[h].name),
                naga::Expression::CallResult(h) => format!("call {:?}", module.functions[h].name),
                naga::Expression::ZeroValue(ty) => format!("zero {}", type_name(ty)),
                naga::Expression::Compose { ty, ref components } => {
                    format!("compose {} {components:?}", type_name(ty))
                }
                ref other => format!("{other:?}"),
            })
            .collect();
        statements_ir(module, &function.body, &mut ir);
        ir.push(format!("{} locals", function.local_variables.len()));
        ir
    }

    // Blocks carry source spans in their Debug output, so nested ones are
    // walked rather than printed.
    fn statements_ir(module: &naga::Module, block: &naga::Block, ir: &mut Vec<String>) {
        for statement in block.iter() {
            match *statement {
                naga::Statement::Call {
                    function,
                    ref arguments,
                    result,
                } => ir.push(format!(
                    "call {:?} {arguments:?} {result:?}",
                    module.functions[function].name
                )),
                naga::Statement::If {
                    condition,
                    ref accept,
                    ref reject,
                } => {
                    ir.push(format!("if {condition:?}"));
                    statements_ir(module, accept, ir);
                    ir.push("else".to_string());
                    statements_ir(module, reject, ir);
                    ir.push("end if".to_string());
                }
                ref other => ir.push(format!("{other:?}")),
            }
        }
    }

    #[test]
    fn both_programs_compile_with_identical_dissolve_logic() {
        let store = DissolveParams::default().uniform_store().unwrap();
        let patch = shader_patch();

        let color = compile(BaseModel::Standard, &patch, &store, "dissolve").unwrap();
        let depth = compile(BaseModel::Depth, &patch, &store, "dissolve").unwrap();

        let declaration = store.wgsl_declaration(crate::patch::MATERIAL_GROUP, 0);
        for shader in [&color, &depth] {
            let source = shader.source();
            assert!(source.contains(&declaration));
            assert!(source.contains(FRAGMENT_SOURCE));
            assert_eq!(source.matches("discard;").count(), 1);
            assert_eq!(source.matches("fn patch_output_fragment(").count(), 1);
            assert_eq!(source.matches("patch_output_fragment(in, &out_color);").count(), 1);
            assert_eq!(source.matches("patch_begin_vertex(input, &transformed, &object_normal);").count(), 1);
            let distinctive = OUTPUT_CHUNK
                .lines()
                .chain([BEGIN_VERTEX_CHUNK])
                .map(str::trim)
                .filter(|line| line.len() > 1);
            for line in distinctive {
                assert_eq!(source.matches(line).count(), 1, "{line}");
            }
        }

        let color_ir = dissolve_fragment_ir(&color.validate().unwrap());
        let depth_ir = dissolve_fragment_ir(&depth.validate().unwrap());
        assert!(!color_ir.is_empty());
        assert_eq!(color_ir, depth_ir);
    }

    #[test]
    fn preset_names_are_unique() {
        for (i, a) in PRESETS.iter().enumerate() {
            assert!(PRESETS[i + 1..].iter().all(|b| b.name != a.name));
        }
    }
}
