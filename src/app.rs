use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::KeyCode;
use winit::window::{Window, WindowId};

use crate::assets::Assets;
use crate::error::AppError;
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::orbit_camera::OrbitCamera;
use crate::panel::{ParamChange, ParameterDefaults, ParameterPanel};
use crate::post_process::BloomSettings;
use crate::renderer::Renderer;
use crate::scene::{DissolveScene, SceneSettings};

/// Sphere points sampled each frame for the panel's "revealed" readout.
const REVEAL_SAMPLES: usize = 256;

/// Configuration for the app window and demo scene.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Font for panel labels. When unset, common system fonts are probed.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub shadow_map_size: u32,
    pub sphere_segments: u32,
    pub sphere_rings: u32,
    pub params: ParameterDefaults,
    pub vsync: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Dissolve".to_string(),
            width: 1280,
            height: 720,
            font_path: None,
            font_size: 15.0,
            shadow_map_size: 1024,
            sphere_segments: 32,
            sphere_rings: 16,
            params: ParameterDefaults::default(),
            vsync: true,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `DISSOLVE_FONT`, `DISSOLVE_WIDTH`,
    /// `DISSOLVE_HEIGHT` and `DISSOLVE_NO_VSYNC`.
    pub fn from_env() -> Self {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`. Unparseable values
    /// are logged and ignored.
    pub fn overlay_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("DISSOLVE_FONT").filter(|p| !p.trim().is_empty()) {
            self.font_path = Some(PathBuf::from(path));
        }
        for (key, slot) in [
            ("DISSOLVE_WIDTH", &mut self.width),
            ("DISSOLVE_HEIGHT", &mut self.height),
        ] {
            let Some(raw) = lookup(key) else {
                continue;
            };
            match raw.trim().parse::<u32>() {
                Ok(value) if value > 0 => *slot = value,
                _ => log::warn!("ignoring {key}={raw:?}: expected a positive integer"),
            }
        }
        if let Some(raw) = lookup("DISSOLVE_NO_VSYNC") {
            let raw = raw.trim();
            self.vsync = raw.is_empty() || raw == "0" || raw.eq_ignore_ascii_case("false");
        }
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn font(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size.max(1);
        self
    }

    pub fn sphere_tessellation(mut self, segments: u32, rings: u32) -> Self {
        self.sphere_segments = segments.max(3);
        self.sphere_rings = rings.max(2);
        self
    }

    pub fn params(mut self, params: ParameterDefaults) -> Self {
        self.params = params;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn scene_settings(&self) -> SceneSettings {
        SceneSettings {
            sphere_segments: self.sphere_segments,
            sphere_rings: self.sphere_rings,
            shadow_map_size: self.shadow_map_size,
        }
    }
}

/// Elapsed time since the last restart plus per-frame delta.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            start: now,
            last_frame: now,
        }
    }

    /// Reset elapsed time to zero. Frame deltas are unaffected.
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    /// Advance to now and return `(elapsed, dt)` in seconds.
    pub fn tick(&mut self) -> (f32, f32) {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> (f32, f32) {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f32();
        let dt = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        (elapsed, dt)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything that exists once the window is up.
struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: Renderer,
    scene: DissolveScene,
    assets: Assets,
    panel: ParameterPanel,
    orbit: OrbitCamera,
    input: Input,
    bloom: BloomSettings,
    clock: FrameClock,
}

impl Running {
    fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self, AppError> {
        let attributes = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let gpu = GpuContext::new(window.clone(), config.vsync)?;
        let renderer = Renderer::new(&gpu, config.shadow_map_size)?;

        let params = config.params.clamped();
        let scene = DissolveScene::new(
            &gpu,
            renderer.layouts(),
            &params.dissolve,
            &config.scene_settings(),
        )?;

        let mut assets = Assets::new();
        let font = assets.load_default_font(&gpu, config.font_path.as_deref(), config.font_size)?;

        let orbit = OrbitCamera::from_position(Vec3::new(1.5, 0.0, 4.0), Vec3::ZERO)
            .fov(75.0)
            .zoom(1.5);

        log::info!(
            "started {}x{} (vsync: {}, labels: {})",
            gpu.width(),
            gpu.height(),
            config.vsync,
            font.is_some()
        );

        Ok(Self {
            window,
            gpu,
            renderer,
            scene,
            assets,
            panel: ParameterPanel::new(font, params.preset),
            orbit,
            input: Input::new(),
            bloom: params.bloom,
            clock: FrameClock::new(),
        })
    }

    fn apply(&mut self, change: ParamChange) {
        log::debug!("parameter change: {change:?}");
        match change {
            ParamChange::Restart => self.clock.restart(),
            change => change.apply(&mut self.scene.uniforms.borrow_mut(), &mut self.bloom),
        }
    }

    fn frame(&mut self) {
        let changes = self
            .panel
            .handle_input(&self.input, &self.scene.uniforms.borrow(), &self.bloom);
        for change in changes {
            self.apply(change);
        }

        let (elapsed, dt) = self.clock.tick();
        self.scene.uniforms.borrow_mut().tick(elapsed);

        if !self.panel.wants_pointer(&self.input) {
            self.orbit.handle_input(&self.input);
        }
        self.orbit.update(dt);

        let revealed = self.scene.params().revealed_fraction(elapsed, REVEAL_SAMPLES);
        let draw2d = self.renderer.draw2d();
        draw2d.update_font_bind_groups(&self.gpu, &self.assets);
        self.panel.draw(
            draw2d,
            &self.assets,
            &self.scene.uniforms.borrow(),
            &self.bloom,
            revealed,
        );

        self.renderer.render(
            &self.gpu,
            &mut self.scene.scene,
            &self.orbit.camera(),
            &self.bloom,
        );

        self.input.begin_frame();
        self.window.request_redraw();
    }
}

enum AppState {
    Pending(AppConfig),
    Running(Box<Running>),
}

struct DissolveApp {
    state: AppState,
    error: Option<AppError>,
}

impl ApplicationHandler for DissolveApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Pending(config) = &self.state else {
            return;
        };
        match Running::new(event_loop, config) {
            Ok(running) => {
                running.window.request_redraw();
                self.state = AppState::Running(Box::new(running));
            }
            Err(err) => {
                log::error!("startup failed: {err}");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let AppState::Running(app) = &mut self.state else {
            return;
        };

        app.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if app.input.key_pressed(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                app.frame();
            }
            _ => {}
        }
    }
}

/// Open the window and run the dissolve demo until it is closed.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DissolveApp {
        state: AppState::Pending(config),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builder_sets_fields() {
        let config = AppConfig::new()
            .title("Test")
            .size(640, 480)
            .font("/tmp/font.ttf")
            .shadow_map_size(2048)
            .sphere_tessellation(64, 1)
            .vsync(false);

        assert_eq!(config.title, "Test");
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.font_path, Some(PathBuf::from("/tmp/font.ttf")));
        assert_eq!(config.scene_settings().shadow_map_size, 2048);
        assert_eq!((config.sphere_segments, config.sphere_rings), (64, 2));
        assert!(!config.vsync);
    }

    #[test]
    fn env_overrides_apply() {
        let config = AppConfig::default().overlay_env(env(&[
            ("DISSOLVE_FONT", "/fonts/mono.ttf"),
            ("DISSOLVE_WIDTH", "1920"),
            ("DISSOLVE_HEIGHT", " 1080 "),
            ("DISSOLVE_NO_VSYNC", "1"),
        ]));
        assert_eq!(config.font_path, Some(PathBuf::from("/fonts/mono.ttf")));
        assert_eq!((config.width, config.height), (1920, 1080));
        assert!(!config.vsync);
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let defaults = AppConfig::default();
        let config = AppConfig::default().overlay_env(env(&[
            ("DISSOLVE_FONT", "  "),
            ("DISSOLVE_WIDTH", "wide"),
            ("DISSOLVE_HEIGHT", "0"),
            ("DISSOLVE_NO_VSYNC", "0"),
        ]));
        assert_eq!(config, defaults);
    }

    #[test]
    fn clock_reports_elapsed_and_delta() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);

        let (elapsed, dt) = clock.tick_at(start + Duration::from_millis(500));
        assert!((elapsed - 0.5).abs() < 1e-4);
        assert!((dt - 0.5).abs() < 1e-4);

        let (elapsed, dt) = clock.tick_at(start + Duration::from_millis(600));
        assert!((elapsed - 0.6).abs() < 1e-4);
        assert!((dt - 0.1).abs() < 1e-4);
    }

    #[test]
    fn restart_resets_elapsed_time() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let (before, _) = clock.tick_at(start + Duration::from_secs(30));
        assert!((before - 30.0).abs() < 1e-3);

        clock.restart();
        let (after, _) = clock.tick_at(Instant::now() + Duration::from_millis(250));
        assert!(after < 1.0);
    }
}
