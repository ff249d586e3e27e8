//! Input system for handling keyboard and mouse input
//!
//! Translates winit window events into camera commands:
//!
//! - W/A/S/D move the camera by the fixed `move_step` once per frame while held
//! - holding the right mouse button enters look mode; every cursor sample is measured
//!   from the window centre and the cursor is re-centred afterwards
//! - Escape requests quit
//! - gaining focus re-centres the cursor, losing it drops all held input
//!
//! The system never touches the window itself. Whenever the cursor has to be moved
//! back to the centre it raises a flag that the event loop drains with
//! [`InputSystem::take_recentre_request`].

use std::collections::HashSet;

use tracing::debug;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::component::Camera;
use crate::core::config::InputConfig;
use crate::math::Vector2;

/// InputSystem tracks held keys and look-mode state between frames
#[derive(Debug)]
pub struct InputSystem {
    pressed_keys: HashSet<KeyCode>,

    // Right button held
    looking: bool,
    // Accumulated cursor offset from the centre since the last update, in pixels
    look_delta: (f64, f64),

    move_step: f32,
    look_sensitivity: f32,

    quit_requested: bool,
    recentre_requested: bool,
}

impl InputSystem {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            pressed_keys: HashSet::new(),
            looking: false,
            look_delta: (0.0, 0.0),
            move_step: config.move_step,
            look_sensitivity: config.look_sensitivity,
            quit_requested: false,
            recentre_requested: false,
        }
    }

    /// Process one window event
    ///
    /// `consumed_by_overlay` is the egui-winit verdict for this event: consumed
    /// events only update release state so that keys never get stuck.
    /// `centre` is the window centre in physical pixels.
    pub fn handle_window_event(&mut self, event: &WindowEvent, consumed_by_overlay: bool, centre: (f64, f64)) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if consumed_by_overlay && event.state == ElementState::Pressed {
                        return;
                    }
                    self.on_keyboard_input(code, event.state);
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if consumed_by_overlay && *state == ElementState::Pressed {
                    return;
                }
                self.on_mouse_button(*button, *state);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if !consumed_by_overlay || self.looking {
                    self.on_cursor_moved((position.x, position.y), centre);
                }
            }
            WindowEvent::Focused(focused) => self.on_focus_changed(*focused),
            _ => {}
        }
    }

    pub fn on_keyboard_input(&mut self, code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if code == KeyCode::Escape {
                    debug!("Escape pressed, quit requested");
                    self.quit_requested = true;
                }
                self.pressed_keys.insert(code);
            }
            ElementState::Released => {
                self.pressed_keys.remove(&code);
            }
        }
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Right {
            return;
        }
        match state {
            ElementState::Pressed => {
                self.looking = true;
                self.look_delta = (0.0, 0.0);
                self.recentre_requested = true;
            }
            ElementState::Released => {
                self.looking = false;
                self.look_delta = (0.0, 0.0);
            }
        }
    }

    /// Cursor sample in look mode: offset from the centre, then re-centre
    pub fn on_cursor_moved(&mut self, position: (f64, f64), centre: (f64, f64)) {
        if !self.looking {
            return;
        }
        let dx = position.0 - centre.0;
        let dy = position.1 - centre.1;
        // The re-centring warp itself produces a sample at the centre
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.look_delta.0 += dx;
        self.look_delta.1 += dy;
        self.recentre_requested = true;
    }

    pub fn on_focus_changed(&mut self, focused: bool) {
        if focused {
            self.recentre_requested = true;
        } else {
            self.pressed_keys.clear();
            self.looking = false;
            self.look_delta = (0.0, 0.0);
        }
    }

    /// Apply the held keys and the accumulated look offset to the camera
    ///
    /// Called once per frame before the scene is updated.
    pub fn update_camera(&mut self, camera: &mut Camera) {
        let step = self.move_step;
        if self.is_key_pressed(KeyCode::KeyW) {
            camera.move_forward(step);
        }
        if self.is_key_pressed(KeyCode::KeyS) {
            camera.move_backward(step);
        }
        if self.is_key_pressed(KeyCode::KeyA) {
            camera.strafe_left(step);
        }
        if self.is_key_pressed(KeyCode::KeyD) {
            camera.strafe_right(step);
        }

        let (dx, dy) = std::mem::take(&mut self.look_delta);
        if self.looking && (dx != 0.0 || dy != 0.0) {
            camera.update_look_at(Vector2::new(
                dx as f32 * self.look_sensitivity,
                dy as f32 * self.look_sensitivity,
            ));
        }
    }

    /// Whether the cursor must be moved back to the window centre; clears the flag
    pub fn take_recentre_request(&mut self) -> bool {
        std::mem::take(&mut self.recentre_requested)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_looking(&self) -> bool {
        self.looking
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }
}
