//! Live tweak panel for the dissolve and bloom parameters.
//!
//! The panel holds no parameter values of its own: sliders read from the
//! sphere's [`UniformStore`] and the [`BloomSettings`] each frame, and user
//! input turns into [`ParamChange`]s that the app applies immediately.

use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::assets::{Assets, FontId};
use crate::dissolve::{
    DissolveParams, PRESETS, U_ANIMATION_SPEED, U_EDGE_COLOR, U_MIDDLE_COLOR, U_NOISE_FREQUENCY,
};
use crate::draw2d::{Color, Draw2d, Rect};
use crate::input::Input;
use crate::post_process::BloomSettings;
use crate::uniforms::UniformStore;

const PANEL_X: f32 = 12.0;
const PANEL_Y: f32 = 12.0;
const PANEL_WIDTH: f32 = 300.0;
const PADDING: f32 = 10.0;
const ROW_HEIGHT: f32 = 26.0;
const LABEL_WIDTH: f32 = 120.0;
const VALUE_WIDTH: f32 = 44.0;
const ROWS: usize = 13;

const PANEL_BG: Color = Color::rgba(0.08, 0.08, 0.1, 0.85);
const PANEL_BORDER: Color = Color::rgba(0.4, 0.4, 0.4, 1.0);
const TRACK: Color = Color::rgba(0.22, 0.22, 0.25, 1.0);
const BUTTON: Color = Color::rgba(0.2, 0.2, 0.24, 1.0);
const BUTTON_HOT: Color = Color::rgba(0.3, 0.3, 0.36, 1.0);
const TEXT: Color = Color::rgba(0.9, 0.9, 0.9, 1.0);
const TEXT_DIM: Color = Color::rgba(0.6, 0.6, 0.6, 1.0);

/// Inclusive slider range with a step size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliderRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl SliderRange {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    /// Clamp into the range and snap to the nearest step.
    pub fn quantize(&self, value: f32) -> f32 {
        if value <= self.min {
            return self.min;
        }
        if value >= self.max {
            return self.max;
        }
        if self.step <= 0.0 {
            return value;
        }
        let steps = ((value - self.min) / self.step).round();
        (self.min + steps * self.step).min(self.max)
    }

    /// Value at a position along the track, `0.0` being the left end.
    pub fn value_at_fraction(&self, fraction: f32) -> f32 {
        self.quantize(self.min + fraction.clamp(0.0, 1.0) * (self.max - self.min))
    }

    pub fn fraction_of(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Numeric parameters the panel exposes as sliders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarParam {
    AnimationSpeed,
    NoiseFrequency,
    BloomThreshold,
    BloomIntensity,
    BloomSmoothing,
}

impl ScalarParam {
    pub fn label(self) -> &'static str {
        match self {
            ScalarParam::AnimationSpeed => "Speed",
            ScalarParam::NoiseFrequency => "Frequency",
            ScalarParam::BloomThreshold => "Threshold",
            ScalarParam::BloomIntensity => "Intensity",
            ScalarParam::BloomSmoothing => "Smoothing",
        }
    }

    pub fn range(self) -> SliderRange {
        match self {
            ScalarParam::AnimationSpeed => SliderRange::new(0.0, 3.0, 0.01),
            ScalarParam::NoiseFrequency => SliderRange::new(0.0, 10.0, 0.01),
            ScalarParam::BloomThreshold => SliderRange::new(0.0, 5.0, 0.01),
            ScalarParam::BloomIntensity => SliderRange::new(0.0, 3.0, 0.01),
            ScalarParam::BloomSmoothing => SliderRange::new(0.0, 0.5, 0.01),
        }
    }

    /// Current value, read from wherever the parameter lives.
    pub fn current(self, store: &UniformStore, bloom: &BloomSettings) -> f32 {
        match self {
            ScalarParam::AnimationSpeed => store.scalar(U_ANIMATION_SPEED).unwrap_or_default(),
            ScalarParam::NoiseFrequency => store.scalar(U_NOISE_FREQUENCY).unwrap_or_default(),
            ScalarParam::BloomThreshold => bloom.threshold,
            ScalarParam::BloomIntensity => bloom.intensity,
            ScalarParam::BloomSmoothing => bloom.smoothing,
        }
    }
}

/// The two rim colours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorParam {
    Edge,
    Middle,
}

impl ColorParam {
    pub fn label(self) -> &'static str {
        match self {
            ColorParam::Edge => "Edge color",
            ColorParam::Middle => "Middle color",
        }
    }

    pub fn uniform(self) -> &'static str {
        match self {
            ColorParam::Edge => U_EDGE_COLOR,
            ColorParam::Middle => U_MIDDLE_COLOR,
        }
    }

    /// This slot's colour in every preset, in preset order.
    fn palette(self) -> impl Iterator<Item = u32> {
        PRESETS.iter().map(move |preset| match self {
            ColorParam::Edge => preset.edge,
            ColorParam::Middle => preset.middle,
        })
    }

    /// The palette entry after `current`, wrapping. Colours outside the
    /// palette step to its first entry.
    pub fn next_color(self, current: u32) -> u32 {
        let palette: Vec<u32> = self.palette().collect();
        match palette.iter().position(|&c| c == current) {
            Some(i) => palette[(i + 1) % palette.len()],
            None => palette.first().copied().unwrap_or(current),
        }
    }
}

/// A parameter edit produced by the panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamChange {
    Scalar(ScalarParam, f32),
    Color(ColorParam, u32),
    /// Index into [`PRESETS`].
    Preset(usize),
    BloomEnabled(bool),
    /// Reset elapsed time to zero and replay the reveal.
    Restart,
}

impl ParamChange {
    /// Write the change into the uniform store or bloom settings. Values are
    /// clamped to their slider range. [`ParamChange::Restart`] touches
    /// neither; the frame clock owns elapsed time.
    pub fn apply(self, store: &mut UniformStore, bloom: &mut BloomSettings) {
        match self {
            ParamChange::Scalar(param, value) => {
                let value = param.range().quantize(value);
                match param {
                    ScalarParam::AnimationSpeed => {
                        store.set_scalar(U_ANIMATION_SPEED, value);
                    }
                    ScalarParam::NoiseFrequency => {
                        store.set_scalar(U_NOISE_FREQUENCY, value);
                    }
                    ScalarParam::BloomThreshold => bloom.threshold = value,
                    ScalarParam::BloomIntensity => bloom.intensity = value,
                    ScalarParam::BloomSmoothing => bloom.smoothing = value,
                }
            }
            ParamChange::Color(param, hex) => {
                store.set_color(param.uniform(), hex & 0x00ff_ffff);
            }
            ParamChange::Preset(index) => {
                let Some(preset) = PRESETS.get(index) else {
                    log::warn!("ignoring unknown preset index {index}");
                    return;
                };
                store.set_color(U_EDGE_COLOR, preset.edge);
                store.set_color(U_MIDDLE_COLOR, preset.middle);
            }
            ParamChange::BloomEnabled(enabled) => bloom.enabled = enabled,
            ParamChange::Restart => {}
        }
    }
}

/// Starting values for everything the panel controls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterDefaults {
    pub dissolve: DissolveParams,
    pub bloom: BloomSettings,
    /// Index into [`PRESETS`] shown as selected at startup.
    pub preset: usize,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            dissolve: DissolveParams::default(),
            bloom: BloomSettings::default(),
            preset: 0,
        }
    }
}

impl ParameterDefaults {
    /// Start from `PRESETS[index]` instead of the default preset.
    pub fn with_preset(mut self, index: usize) -> Self {
        let index = index % PRESETS.len();
        self.dissolve = self.dissolve.with_preset(&PRESETS[index]);
        self.preset = index;
        self
    }

    /// Every value forced into its slider range.
    pub fn clamped(self) -> Self {
        let speed = ScalarParam::AnimationSpeed.range();
        let frequency = ScalarParam::NoiseFrequency.range();
        Self {
            dissolve: DissolveParams {
                animation_speed: speed.quantize(self.dissolve.animation_speed),
                noise_frequency: frequency.quantize(self.dissolve.noise_frequency),
                ..self.dissolve
            },
            bloom: self.bloom.clamped(),
            preset: self.preset % PRESETS.len(),
        }
    }
}

/// Something on the panel that reacts to a click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Slider(ScalarParam),
    Swatch(ColorParam),
    PresetButton,
    BloomToggle,
    RestartButton,
}

/// Panel rows from top to bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Row {
    Heading(&'static str),
    Control(Control),
    Revealed,
    Hint,
}

static LAYOUT: [Row; ROWS] = [
    Row::Heading("Dissolve"),
    Row::Control(Control::Slider(ScalarParam::AnimationSpeed)),
    Row::Control(Control::Slider(ScalarParam::NoiseFrequency)),
    Row::Control(Control::Swatch(ColorParam::Edge)),
    Row::Control(Control::Swatch(ColorParam::Middle)),
    Row::Control(Control::PresetButton),
    Row::Control(Control::BloomToggle),
    Row::Control(Control::Slider(ScalarParam::BloomThreshold)),
    Row::Control(Control::Slider(ScalarParam::BloomIntensity)),
    Row::Control(Control::Slider(ScalarParam::BloomSmoothing)),
    Row::Control(Control::RestartButton),
    Row::Revealed,
    Row::Hint,
];

fn row_rect(index: usize) -> Rect {
    Rect::new(
        PANEL_X + PADDING,
        PANEL_Y + PADDING + index as f32 * ROW_HEIGHT,
        PANEL_WIDTH - 2.0 * PADDING,
        ROW_HEIGHT,
    )
}

/// Hit area of a control within its row, right of the label column.
fn control_rect(row: Rect, control: Control) -> Rect {
    let x = row.x + LABEL_WIDTH;
    let width = row.width - LABEL_WIDTH;
    match control {
        Control::Slider(_) => Rect::new(x, row.y, width - VALUE_WIDTH, row.height),
        Control::Swatch(_) => Rect::new(x, row.y + 4.0, 48.0, row.height - 8.0),
        Control::BloomToggle => Rect::new(x, row.y + 5.0, row.height - 10.0, row.height - 10.0),
        Control::PresetButton | Control::RestartButton => {
            Rect::new(x, row.y + 3.0, width, row.height - 6.0)
        }
    }
}

pub struct ParameterPanel {
    visible: bool,
    font: Option<FontId>,
    preset: usize,
    dragging: Option<ScalarParam>,
}

impl ParameterPanel {
    /// A visible panel. Labels are drawn only when `font` is set.
    pub fn new(font: Option<FontId>, preset: usize) -> Self {
        Self {
            visible: true,
            font,
            preset: preset % PRESETS.len(),
            dragging: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn preset(&self) -> usize {
        self.preset
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            PANEL_X,
            PANEL_Y,
            PANEL_WIDTH,
            2.0 * PADDING + ROWS as f32 * ROW_HEIGHT,
        )
    }

    /// Whether the pointer belongs to the panel this frame, so camera drag
    /// should be ignored.
    pub fn wants_pointer(&self, input: &Input) -> bool {
        let pos = input.mouse_position();
        self.visible && (self.dragging.is_some() || self.bounds().contains(pos.x, pos.y))
    }

    /// Every clickable control with its hit rectangle.
    pub fn controls(&self) -> impl Iterator<Item = (Control, Rect)> {
        LAYOUT.iter().enumerate().filter_map(|(i, row)| match *row {
            Row::Control(control) => Some((control, control_rect(row_rect(i), control))),
            _ => None,
        })
    }

    /// Control under `(x, y)`. Slider hit areas cover their whole row
    /// height.
    pub fn control_at(&self, x: f32, y: f32) -> Option<Control> {
        if !self.visible {
            return None;
        }
        self.controls()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(control, _)| control)
    }

    fn slider_rect(&self, param: ScalarParam) -> Option<Rect> {
        self.controls()
            .find(|(control, _)| *control == Control::Slider(param))
            .map(|(_, rect)| rect)
    }

    fn slider_value(&self, param: ScalarParam, x: f32) -> Option<f32> {
        let rect = self.slider_rect(param)?;
        Some(param.range().value_at_fraction((x - rect.x) / rect.width))
    }

    /// Handle a keyboard shortcut. `H` only toggles visibility and yields no
    /// change.
    pub fn handle_key(&mut self, key: KeyCode, bloom: &BloomSettings) -> Option<ParamChange> {
        match key {
            KeyCode::Space => Some(ParamChange::Restart),
            KeyCode::KeyB => Some(ParamChange::BloomEnabled(!bloom.enabled)),
            KeyCode::KeyP => Some(self.next_preset()),
            KeyCode::KeyH => {
                self.visible = !self.visible;
                self.dragging = None;
                None
            }
            _ => None,
        }
    }

    fn next_preset(&mut self) -> ParamChange {
        self.preset = (self.preset + 1) % PRESETS.len();
        ParamChange::Preset(self.preset)
    }

    /// Left button pressed at `(x, y)`.
    pub fn press(
        &mut self,
        x: f32,
        y: f32,
        store: &UniformStore,
        bloom: &BloomSettings,
    ) -> Option<ParamChange> {
        match self.control_at(x, y)? {
            Control::Slider(param) => {
                self.dragging = Some(param);
                Some(ParamChange::Scalar(param, self.slider_value(param, x)?))
            }
            Control::Swatch(param) => {
                let current = store.color(param.uniform()).map_or(0, Color::to_hex);
                Some(ParamChange::Color(param, param.next_color(current)))
            }
            Control::PresetButton => Some(self.next_preset()),
            Control::BloomToggle => Some(ParamChange::BloomEnabled(!bloom.enabled)),
            Control::RestartButton => Some(ParamChange::Restart),
        }
    }

    /// Pointer moved to `x` with the button held.
    pub fn drag(&mut self, x: f32) -> Option<ParamChange> {
        let param = self.dragging?;
        Some(ParamChange::Scalar(param, self.slider_value(param, x)?))
    }

    pub fn release(&mut self) {
        self.dragging = None;
    }

    /// Turn this frame's input into parameter changes.
    pub fn handle_input(
        &mut self,
        input: &Input,
        store: &UniformStore,
        bloom: &BloomSettings,
    ) -> Vec<ParamChange> {
        let mut changes = Vec::new();
        for key in [KeyCode::Space, KeyCode::KeyB, KeyCode::KeyP, KeyCode::KeyH] {
            if input.key_pressed(key) {
                changes.extend(self.handle_key(key, bloom));
            }
        }

        let pos = input.mouse_position();
        if input.mouse_pressed(MouseButton::Left) {
            changes.extend(self.press(pos.x, pos.y, store, bloom));
        } else if input.mouse_down(MouseButton::Left) && input.mouse_delta() != glam::Vec2::ZERO {
            changes.extend(self.drag(pos.x));
        }
        if input.mouse_released(MouseButton::Left) {
            self.release();
        }
        changes
    }

    /// Queue the panel into `draw2d`. `revealed` is the visible fraction of
    /// the sphere, shown as a percentage.
    pub fn draw(
        &self,
        draw2d: &mut Draw2d,
        assets: &Assets,
        store: &UniformStore,
        bloom: &BloomSettings,
        revealed: f32,
    ) {
        if !self.visible {
            return;
        }

        let bounds = self.bounds();
        draw2d.rect(bounds, PANEL_BG);
        draw2d.outline(bounds, 1.0, PANEL_BORDER);

        let accent = store
            .color(U_EDGE_COLOR)
            .unwrap_or(Color::from_hex(PRESETS[0].edge));

        for (i, row) in LAYOUT.iter().enumerate() {
            let rect = row_rect(i);
            match *row {
                Row::Heading(title) => self.label(draw2d, assets, rect, title, TEXT),
                Row::Control(control) => {
                    self.draw_control(draw2d, assets, rect, control, store, bloom, accent)
                }
                Row::Revealed => {
                    let text = format!("Revealed {:.0}%", revealed.clamp(0.0, 1.0) * 100.0);
                    self.label(draw2d, assets, rect, &text, TEXT_DIM);
                }
                Row::Hint => self.label(
                    draw2d,
                    assets,
                    rect,
                    "Space restart  B bloom  P preset  H hide",
                    TEXT_DIM,
                ),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_control(
        &self,
        draw2d: &mut Draw2d,
        assets: &Assets,
        row: Rect,
        control: Control,
        store: &UniformStore,
        bloom: &BloomSettings,
        accent: Color,
    ) {
        let rect = control_rect(row, control);
        match control {
            Control::Slider(param) => {
                self.label(draw2d, assets, row, param.label(), TEXT);
                let value = param.current(store, bloom);
                let track = Rect::new(rect.x, rect.y + rect.height * 0.5 - 2.0, rect.width, 4.0);
                draw2d.rect(track, TRACK);
                let filled = param.range().fraction_of(value) * track.width;
                draw2d.rect(Rect::new(track.x, track.y, filled, track.height), accent);
                let handle = Rect::new(track.x + filled - 3.0, rect.y + 5.0, 6.0, rect.height - 10.0);
                draw2d.rect(handle, TEXT);

                let value_rect = Rect::new(rect.x + rect.width + 6.0, row.y, VALUE_WIDTH, row.height);
                self.label(draw2d, assets, value_rect, &format!("{value:.2}"), TEXT_DIM);
            }
            Control::Swatch(param) => {
                self.label(draw2d, assets, row, param.label(), TEXT);
                let color = store.color(param.uniform()).unwrap_or(Color::BLACK);
                draw2d.rect(rect, color);
                draw2d.outline(rect, 1.0, PANEL_BORDER);
            }
            Control::PresetButton => {
                self.label(draw2d, assets, row, "Preset", TEXT);
                self.button(draw2d, assets, rect, PRESETS[self.preset].name, self.is_custom(store));
            }
            Control::BloomToggle => {
                self.label(draw2d, assets, row, "Bloom", TEXT);
                draw2d.outline(rect, 1.0, PANEL_BORDER);
                if bloom.enabled {
                    draw2d.rect(rect.inset(3.0), accent);
                }
            }
            Control::RestartButton => {
                self.button(draw2d, assets, rect, "Restart", false);
            }
        }
    }

    /// Whether the rim colours no longer match the selected preset.
    fn is_custom(&self, store: &UniformStore) -> bool {
        let preset = PRESETS[self.preset];
        let params = DissolveParams::from_store(store);
        (params.edge_color, params.middle_color) != (preset.edge, preset.middle)
    }

    fn button(&self, draw2d: &mut Draw2d, assets: &Assets, rect: Rect, text: &str, dim: bool) {
        draw2d.rect(rect, if dim { BUTTON } else { BUTTON_HOT });
        draw2d.outline(rect, 1.0, PANEL_BORDER);
        let Some(font) = self.font else {
            return;
        };
        let Some(atlas) = assets.font(font) else {
            return;
        };
        let x = rect.x + (rect.width - atlas.measure(text)) * 0.5;
        let y = rect.y + (rect.height - atlas.line_height()) * 0.5;
        draw2d.text(assets, font, x, y, text, if dim { TEXT_DIM } else { TEXT });
    }

    fn label(&self, draw2d: &mut Draw2d, assets: &Assets, rect: Rect, text: &str, color: Color) {
        let Some(font) = self.font else {
            return;
        };
        let line_height = assets.font(font).map_or(rect.height, |atlas| atlas.line_height());
        let y = rect.y + (rect.height - line_height) * 0.5;
        draw2d.text(assets, font, rect.x, y, text, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UniformStore {
        DissolveParams::default()
            .uniform_store()
            .expect("dissolve uniforms declare once")
    }

    #[test]
    fn quantize_clamps_and_snaps() {
        let range = SliderRange::new(0.0, 3.0, 0.01);
        assert_eq!(range.quantize(-1.0), 0.0);
        assert_eq!(range.quantize(7.0), 3.0);
        assert!((range.quantize(1.2345) - 1.23).abs() < 1e-5);

        let free = SliderRange::new(0.0, 1.0, 0.0);
        assert_eq!(free.quantize(0.3333), 0.3333);
    }

    #[test]
    fn fraction_round_trips_through_the_track() {
        let range = ScalarParam::NoiseFrequency.range();
        assert_eq!(range.value_at_fraction(0.0), 0.0);
        assert_eq!(range.value_at_fraction(1.0), 10.0);
        assert_eq!(range.value_at_fraction(1.5), 10.0);
        assert!((range.fraction_of(1.7) - 0.17).abs() < 1e-5);
        assert!((range.value_at_fraction(range.fraction_of(1.7)) - 1.7).abs() < 1e-4);
    }

    #[test]
    fn scalar_changes_are_clamped_to_their_range() {
        let mut store = store();
        let mut bloom = BloomSettings::default();

        ParamChange::Scalar(ScalarParam::AnimationSpeed, 7.0).apply(&mut store, &mut bloom);
        ParamChange::Scalar(ScalarParam::NoiseFrequency, -2.0).apply(&mut store, &mut bloom);
        ParamChange::Scalar(ScalarParam::BloomThreshold, 9.0).apply(&mut store, &mut bloom);
        ParamChange::Scalar(ScalarParam::BloomIntensity, 1.5).apply(&mut store, &mut bloom);
        ParamChange::Scalar(ScalarParam::BloomSmoothing, 0.9).apply(&mut store, &mut bloom);

        assert_eq!(store.scalar(U_ANIMATION_SPEED), Some(3.0));
        assert_eq!(store.scalar(U_NOISE_FREQUENCY), Some(0.0));
        assert_eq!(bloom.threshold, 5.0);
        assert!((bloom.intensity - 1.5).abs() < 1e-5);
        assert_eq!(bloom.smoothing, 0.5);
    }

    #[test]
    fn preset_sets_both_rim_colours() {
        let mut store = store();
        let mut bloom = BloomSettings::default();
        ParamChange::Preset(2).apply(&mut store, &mut bloom);

        let params = DissolveParams::from_store(&store);
        assert_eq!(params.edge_color, PRESETS[2].edge);
        assert_eq!(params.middle_color, PRESETS[2].middle);

        ParamChange::Preset(PRESETS.len()).apply(&mut store, &mut bloom);
        assert_eq!(DissolveParams::from_store(&store).edge_color, PRESETS[2].edge);
    }

    #[test]
    fn restart_leaves_values_alone() {
        let mut store = store();
        let mut bloom = BloomSettings::default();
        let before = DissolveParams::from_store(&store);
        ParamChange::Restart.apply(&mut store, &mut bloom);
        assert_eq!(DissolveParams::from_store(&store), before);
        assert_eq!(bloom, BloomSettings::default());
    }

    #[test]
    fn controls_stay_inside_the_panel_without_overlap() {
        let panel = ParameterPanel::new(None, 0);
        let bounds = panel.bounds();
        let controls: Vec<_> = panel.controls().collect();
        assert_eq!(controls.len(), 10);

        for (i, (_, a)) in controls.iter().enumerate() {
            assert!(a.x >= bounds.x && a.x + a.width <= bounds.x + bounds.width);
            assert!(a.y >= bounds.y && a.y + a.height <= bounds.y + bounds.height);
            for (_, b) in &controls[i + 1..] {
                let overlap = a.x < b.x + b.width
                    && b.x < a.x + a.width
                    && a.y < b.y + b.height
                    && b.y < a.y + a.height;
                assert!(!overlap);
            }
        }
    }

    #[test]
    fn pressing_and_dragging_a_slider() {
        let mut panel = ParameterPanel::new(None, 0);
        let store = store();
        let bloom = BloomSettings::default();
        let rect = panel
            .slider_rect(ScalarParam::AnimationSpeed)
            .expect("speed slider is laid out");

        let change = panel.press(rect.x + rect.width - 0.01, rect.y + 1.0, &store, &bloom);
        let Some(ParamChange::Scalar(ScalarParam::AnimationSpeed, value)) = change else {
            panic!("expected a speed change, got {change:?}");
        };
        assert!((value - 3.0).abs() < 1e-4);

        // Dragging past the left edge keeps the slider captured and clamps.
        let change = panel.drag(rect.x - 100.0);
        assert_eq!(change, Some(ParamChange::Scalar(ScalarParam::AnimationSpeed, 0.0)));

        panel.release();
        assert_eq!(panel.drag(rect.x), None);
    }

    #[test]
    fn swatch_click_cycles_the_palette() {
        let mut panel = ParameterPanel::new(None, 0);
        let store = store();
        let bloom = BloomSettings::default();
        let (_, rect) = panel
            .controls()
            .find(|(c, _)| *c == Control::Swatch(ColorParam::Edge))
            .expect("edge swatch is laid out");

        let change = panel.press(rect.x + 1.0, rect.y + 1.0, &store, &bloom);
        assert_eq!(change, Some(ParamChange::Color(ColorParam::Edge, PRESETS[1].edge)));
        assert_eq!(ColorParam::Middle.next_color(0x123456), PRESETS[0].middle);
    }

    #[test]
    fn shortcuts_map_to_changes() {
        let mut panel = ParameterPanel::new(None, PRESETS.len() - 1);
        let bloom = BloomSettings::default();

        assert_eq!(panel.handle_key(KeyCode::Space, &bloom), Some(ParamChange::Restart));
        assert_eq!(
            panel.handle_key(KeyCode::KeyB, &bloom),
            Some(ParamChange::BloomEnabled(false))
        );
        assert_eq!(panel.handle_key(KeyCode::KeyP, &bloom), Some(ParamChange::Preset(0)));

        assert_eq!(panel.handle_key(KeyCode::KeyH, &bloom), None);
        assert!(!panel.is_visible());
        let bounds = panel.bounds();
        assert_eq!(panel.control_at(bounds.x + 200.0, bounds.y + 50.0), None);
    }

    #[test]
    fn defaults_clamp_into_slider_ranges() {
        let mut defaults = ParameterDefaults::default().with_preset(1);
        assert_eq!(defaults.dissolve.edge_color, 0xffa600);
        defaults.dissolve.animation_speed = 12.0;
        defaults.bloom.smoothing = 2.0;

        let clamped = defaults.clamped();
        assert_eq!(clamped.dissolve.animation_speed, 3.0);
        assert_eq!(clamped.bloom.smoothing, 0.5);
        assert_eq!(clamped.preset, 1);
    }
}
