//! Compile a custom patch against both base models and print the WGSL.
//!
//! Runs without a window: the patch compiler validates with naga only.
//!
//! ```text
//! cargo run --example patch_wgsl -- depth
//! ```

use dissolve::Color;
use dissolve::patch::{BaseModel, PatchMap, ShaderPatch, compile};
use dissolve::uniforms::UniformStore;

const STRIPES: &str = "
fn stripe_mask(position: vec3<f32>) -> f32 {
    return step(0.5, fract(position.y * material.u_bands + material.u_time));
}
";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let uniforms = UniformStore::new()
        .with_time("u_time")?
        .with_scalar("u_bands", 6.0)?
        .with_color("u_tint", Color::from_hex(0x39a0eb))?;

    // Cut stripes out of the surface; the depth pass gets the same holes.
    let patch = ShaderPatch::new("", STRIPES).with_patch_map(PatchMap::new().with(
        "output_fragment",
        "if (stripe_mask(in.object_position) < 0.5) {\n    discard;\n}\n\
         out_color = vec4<f32>(out_color.rgb * material.u_tint, out_color.a);",
    ));

    let wanted = std::env::args().nth(1);
    for model in [BaseModel::Standard, BaseModel::Depth] {
        if wanted.as_deref().is_some_and(|name| name != model.name()) {
            continue;
        }
        for point in model.patch_points() {
            let exposes: Vec<&str> = point.exposes.iter().map(|v| v.name).collect();
            log::info!("{model}: {} exposes {exposes:?}", point.name);
        }
        let shader = compile(model, &patch, &uniforms, "stripes")?;
        println!("{}", shader.source());
    }
    Ok(())
}
