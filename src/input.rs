use std::collections::HashSet;
use std::hash::Hash;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Held, pressed-this-frame and released-this-frame state for one kind of button.
#[derive(Debug)]
struct ButtonSet<T> {
    down: HashSet<T>,
    pressed: HashSet<T>,
    released: HashSet<T>,
}

impl<T> Default for ButtonSet<T> {
    fn default() -> Self {
        Self {
            down: HashSet::new(),
            pressed: HashSet::new(),
            released: HashSet::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> ButtonSet<T> {
    fn begin_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }

    fn apply(&mut self, button: T, state: ElementState) {
        match state {
            ElementState::Pressed => {
                // Key repeat re-sends Pressed while held.
                if self.down.insert(button) {
                    self.pressed.insert(button);
                }
            }
            ElementState::Released => {
                self.down.remove(&button);
                self.released.insert(button);
            }
        }
    }
}

/// Keyboard and mouse state, accumulated from window events between frames.
#[derive(Debug, Default)]
pub struct Input {
    keys: ButtonSet<KeyCode>,
    mouse: ButtonSet<MouseButton>,
    mouse_position: Vec2,
    mouse_delta: Vec2,
    scroll_delta: Vec2,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-frame state. Call after the frame has consumed its input.
    pub fn begin_frame(&mut self) {
        self.keys.begin_frame();
        self.mouse.begin_frame();
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = Vec2::ZERO;
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.keys.apply(key, event.state);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => self.mouse.apply(*button, *state),
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_delta += match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => {
                        Vec2::new(pos.x as f32, pos.y as f32) / 120.0
                    }
                };
            }
            // Dropping held buttons avoids stuck drags after alt-tab.
            WindowEvent::Focused(false) => {
                self.keys.down.clear();
                self.mouse.down.clear();
            }
            _ => {}
        }
    }

    fn move_cursor(&mut self, position: Vec2) {
        self.mouse_delta += position - self.mouse_position;
        self.mouse_position = position;
    }

    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys.down.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys.pressed.contains(&key)
    }

    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse.down.contains(&button)
    }

    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse.pressed.contains(&button)
    }

    pub fn mouse_released(&self, button: MouseButton) -> bool {
        self.mouse.released.contains(&button)
    }

    /// Cursor position in physical window pixels.
    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Wheel motion this frame, in lines.
    pub fn scroll_delta(&self) -> Vec2 {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_reported_once_while_held() {
        let mut buttons = ButtonSet::default();
        buttons.apply(KeyCode::Space, ElementState::Pressed);
        assert!(buttons.pressed.contains(&KeyCode::Space));

        buttons.begin_frame();
        buttons.apply(KeyCode::Space, ElementState::Pressed);
        assert!(buttons.down.contains(&KeyCode::Space));
        assert!(!buttons.pressed.contains(&KeyCode::Space));

        buttons.apply(KeyCode::Space, ElementState::Released);
        assert!(!buttons.down.contains(&KeyCode::Space));
        assert!(buttons.released.contains(&KeyCode::Space));
    }

    #[test]
    fn cursor_delta_accumulates_until_frame_reset() {
        let mut input = Input::new();
        input.move_cursor(Vec2::new(10.0, 10.0));
        input.begin_frame();
        input.move_cursor(Vec2::new(13.0, 8.0));
        input.move_cursor(Vec2::new(15.0, 9.0));
        assert_eq!(input.mouse_delta(), Vec2::new(5.0, -1.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.mouse_position(), Vec2::new(15.0, 9.0));
    }
}
