//! Slow frost-coloured reveal with a stronger bloom.

use dissolve::{AppConfig, BloomSettings, DissolveParams, PRESETS, ParameterDefaults};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let preset = PRESETS.iter().position(|p| p.name == "Frost").unwrap_or(0);
    let params = ParameterDefaults {
        dissolve: DissolveParams {
            animation_speed: 0.4,
            noise_frequency: 3.5,
            ..DissolveParams::default()
        }
        .with_preset(&PRESETS[preset]),
        bloom: BloomSettings {
            intensity: 1.6,
            ..BloomSettings::default()
        },
        preset,
    };

    dissolve::run(AppConfig::from_env().title("Frost Dissolve").params(params))?;
    Ok(())
}
