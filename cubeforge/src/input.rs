use std::collections::HashSet;

use glam::{Vec2, Vec3};
use winit::{
    event::{ElementState, KeyEvent, MouseButton},
    keyboard::KeyCode,
};

/// Tracks keyboard and mouse state across frames.
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    keys_released: HashSet<KeyCode>,

    mouse_x: f32,
    mouse_y: f32,
    mouse_delta: Vec2,
    cursor_captured: bool,
    mouse_down: [bool; 8],
    mouse_pressed: [bool; 8],
    mouse_released: [bool; 8],
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            keys_released: HashSet::new(),
            mouse_x: 0.0,
            mouse_y: 0.0,
            mouse_delta: Vec2::ZERO,
            cursor_captured: false,
            mouse_down: [false; 8],
            mouse_pressed: [false; 8],
            mouse_released: [false; 8],
        }
    }

    /// Clear per-frame pressed/released flags.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.mouse_pressed.fill(false);
        self.mouse_released.fill(false);
    }

    /// Handle a keyboard input event from winit.
    pub fn handle_key(&mut self, event: &KeyEvent) {
        if let winit::keyboard::PhysicalKey::Code(keycode) = event.physical_key {
            self.handle_key_code(keycode, event.state);
        }
    }

    /// Record a key transition by physical key code.
    pub fn handle_key_code(&mut self, keycode: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.keys_down.contains(&keycode) {
                    self.keys_pressed.insert(keycode);
                }
                self.keys_down.insert(keycode);
            }
            ElementState::Released => {
                self.keys_down.remove(&keycode);
                self.keys_released.insert(keycode);
            }
        }
    }

    /// Handle a mouse button input event from winit.
    pub fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if let Some(idx) = mouse_button_index(button) {
            match state {
                ElementState::Pressed => {
                    if !self.mouse_down[idx] {
                        self.mouse_pressed[idx] = true;
                    }
                    self.mouse_down[idx] = true;
                }
                ElementState::Released => {
                    self.mouse_down[idx] = false;
                    self.mouse_released[idx] = true;
                }
            }
        }
    }

    /// Handle mouse cursor movement from winit.
    pub fn handle_cursor_moved(&mut self, x: f64, y: f64) {
        self.mouse_x = x as f32;
        self.mouse_y = y as f32;
    }

    /// Accumulate raw pointer motion. Only counted while the cursor is
    /// captured.
    pub fn handle_mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.cursor_captured {
            self.mouse_delta += Vec2::new(dx as f32, dy as f32);
        }
    }

    /// Motion accumulated since the last call, in raw device units.
    pub fn take_mouse_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.mouse_delta)
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn set_cursor_captured(&mut self, captured: bool) {
        self.cursor_captured = captured;
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn is_cursor_captured(&self) -> bool {
        self.cursor_captured
    }

    /// Camera-relative movement from WASD, Space and Shift: x strafes
    /// right, y rises and z moves backward. Normalized when non-zero.
    pub fn movement_vector(&self) -> Vec3 {
        let axis = |negative: KeyCode, positive: KeyCode| {
            let mut value = 0.0;
            if self.is_key_down(negative) {
                value -= 1.0;
            }
            if self.is_key_down(positive) {
                value += 1.0;
            }
            value
        };
        Vec3::new(
            axis(KeyCode::KeyA, KeyCode::KeyD),
            axis(KeyCode::ShiftLeft, KeyCode::Space),
            axis(KeyCode::KeyW, KeyCode::KeyS),
        )
        .normalize_or_zero()
    }

    /// Returns true if the key is currently held down.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key was pressed this frame.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Returns true if the key was released this frame.
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        self.keys_released.contains(&key)
    }

    /// Returns true if the mouse button is currently held down.
    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        mouse_button_index(button)
            .map(|idx| self.mouse_down[idx])
            .unwrap_or(false)
    }

    /// Returns true if the mouse button was pressed this frame.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        mouse_button_index(button)
            .map(|idx| self.mouse_pressed[idx])
            .unwrap_or(false)
    }

    /// Returns true if the mouse button was released this frame.
    pub fn is_mouse_released(&self, button: MouseButton) -> bool {
        mouse_button_index(button)
            .map(|idx| self.mouse_released[idx])
            .unwrap_or(false)
    }

    /// Current mouse cursor position in logical pixels.
    pub fn mouse_position(&self) -> (f32, f32) {
        (self.mouse_x, self.mouse_y)
    }
}

fn mouse_button_index(button: MouseButton) -> Option<usize> {
    match button {
        MouseButton::Left => Some(0),
        MouseButton::Right => Some(1),
        MouseButton::Middle => Some(2),
        MouseButton::Back => Some(3),
        MouseButton::Forward => Some(4),
        MouseButton::Other(raw) => {
            let idx = raw as usize;
            let mapped = 5 + idx; // Reserve 0-4 for standard buttons
            (mapped < 8).then_some(mapped)
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_edges_last_one_frame() {
        let mut input = InputState::new();
        input.handle_mouse_button(MouseButton::Left, ElementState::Pressed);
        assert!(input.is_mouse_pressed(MouseButton::Left));
        assert!(input.is_mouse_down(MouseButton::Left));

        input.begin_frame();
        assert!(!input.is_mouse_pressed(MouseButton::Left));
        assert!(input.is_mouse_down(MouseButton::Left));

        input.handle_mouse_button(MouseButton::Left, ElementState::Released);
        assert!(input.is_mouse_released(MouseButton::Left));
        assert!(!input.is_mouse_down(MouseButton::Left));
    }

    #[test]
    fn mouse_delta_needs_capture() {
        let mut input = InputState::new();
        input.handle_mouse_motion(3.0, 4.0);
        assert_eq!(input.take_mouse_delta(), Vec2::ZERO);

        input.set_cursor_captured(true);
        input.handle_mouse_motion(3.0, 4.0);
        input.handle_mouse_motion(1.0, -1.0);
        assert_eq!(input.mouse_delta(), Vec2::new(4.0, 3.0));
        assert_eq!(input.take_mouse_delta(), Vec2::new(4.0, 3.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn idle_movement_is_zero() {
        assert_eq!(InputState::new().movement_vector(), Vec3::ZERO);
    }

    #[test]
    fn held_keys_move_forward_and_strafe() {
        let mut input = InputState::new();
        input.handle_key_code(KeyCode::KeyW, ElementState::Pressed);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert_eq!(input.movement_vector(), Vec3::NEG_Z);

        input.begin_frame();
        input.handle_key_code(KeyCode::KeyD, ElementState::Pressed);
        let movement = input.movement_vector();
        assert!((movement.length() - 1.0).abs() < 1e-6);
        assert!(movement.x > 0.0 && movement.z < 0.0);

        input.handle_key_code(KeyCode::KeyW, ElementState::Released);
        input.handle_key_code(KeyCode::KeyD, ElementState::Released);
        assert_eq!(input.movement_vector(), Vec3::ZERO);
    }

    #[test]
    fn extra_buttons_map_past_the_standard_ones() {
        assert_eq!(mouse_button_index(MouseButton::Other(0)), Some(5));
        assert_eq!(mouse_button_index(MouseButton::Other(3)), None);
    }
}
