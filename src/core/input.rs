//! Input system for keyboard-driven player movement
//!
//! Keys go through a four-state machine advanced once per tick from the set of
//! physically held keys, so a key is `Press` on its first tick, `Down` while it
//! stays held, `Up` on the tick it is released and `None` afterwards.

use std::collections::HashMap;
use std::collections::HashSet;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

use crate::core::math::Vector3;

/// Per-key state for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    None,
    /// First tick the key is held
    Press,
    /// Held for more than one tick
    Down,
    /// First tick after release
    Up,
}

impl KeyState {
    fn next(self, held: bool) -> Self {
        match (held, self) {
            (true, KeyState::Press | KeyState::Down) => KeyState::Down,
            (true, _) => KeyState::Press,
            (false, KeyState::Press | KeyState::Down) => KeyState::Up,
            (false, _) => KeyState::None,
        }
    }
}

/// Configuration for InputSystem behavior
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Player movement speed in units per second
    pub move_speed: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { move_speed: 5.0 }
    }
}

/// InputSystem tracks keyboard state and moves the player position
pub struct InputSystem {
    held_keys: HashSet<KeyCode>,
    states: HashMap<KeyCode, KeyState>,
    move_speed: f32,
}

/// Keys that drive the player, in priority order
const MOVEMENT_KEYS: [KeyCode; 4] = [KeyCode::KeyW, KeyCode::KeyS, KeyCode::KeyA, KeyCode::KeyD];

impl InputSystem {
    /// Create a new InputSystem with default configuration
    pub fn new() -> Self {
        Self::with_config(InputConfig::default())
    }

    /// Create InputSystem with custom configuration
    pub fn with_config(config: InputConfig) -> Self {
        Self {
            held_keys: HashSet::new(),
            states: HashMap::new(),
            move_speed: config.move_speed,
        }
    }

    /// Process a keyboard event from the window
    pub fn on_keyboard_input(&mut self, keycode: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.held_keys.insert(keycode);
            }
            ElementState::Released => {
                self.held_keys.remove(&keycode);
            }
        }
    }

    /// Advance every tracked key by one tick
    pub fn tick(&mut self) {
        let tracked: HashSet<KeyCode> = self
            .states
            .keys()
            .copied()
            .chain(self.held_keys.iter().copied())
            .collect();

        for key in tracked {
            let held = self.held_keys.contains(&key);
            let state = self.states.entry(key).or_default();
            *state = state.next(held);
        }

        self.states.retain(|_, state| *state != KeyState::None);
    }

    /// Current state of a key
    pub fn key_state(&self, key: KeyCode) -> KeyState {
        self.states.get(&key).copied().unwrap_or_default()
    }

    /// Advance key states and move the player
    ///
    /// Only the first held movement key (W, S, A, D) applies, and only once it
    /// has reached the `Down` state.
    pub fn update_player(&mut self, position: &mut Vector3, delta_time: f32) {
        self.tick();

        let distance = self.move_speed * delta_time;
        let key = MOVEMENT_KEYS
            .iter()
            .copied()
            .find(|k| self.key_state(*k) == KeyState::Down);

        let direction = match key {
            Some(KeyCode::KeyW) => Vector3::new(0.0, 0.0, 1.0),
            Some(KeyCode::KeyS) => Vector3::new(0.0, 0.0, -1.0),
            Some(KeyCode::KeyA) => Vector3::new(-1.0, 0.0, 0.0),
            Some(KeyCode::KeyD) => Vector3::new(1.0, 0.0, 0.0),
            _ => return,
        };

        *position += direction * distance;
    }

    /// Get the current movement speed
    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Set the movement speed
    pub fn set_move_speed(&mut self, speed: f32) {
        self.move_speed = speed;
    }
}

impl Default for InputSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state_machine() {
        let mut input = InputSystem::new();
        assert_eq!(input.key_state(KeyCode::KeyW), KeyState::None);

        input.on_keyboard_input(KeyCode::KeyW, ElementState::Pressed);
        input.tick();
        assert_eq!(input.key_state(KeyCode::KeyW), KeyState::Press);
        input.tick();
        assert_eq!(input.key_state(KeyCode::KeyW), KeyState::Down);

        input.on_keyboard_input(KeyCode::KeyW, ElementState::Released);
        input.tick();
        assert_eq!(input.key_state(KeyCode::KeyW), KeyState::Up);
        input.tick();
        assert_eq!(input.key_state(KeyCode::KeyW), KeyState::None);
    }

    #[test]
    fn test_player_moves_only_while_held() {
        let mut input = InputSystem::new();
        let mut position = Vector3::zeros();

        input.on_keyboard_input(KeyCode::KeyD, ElementState::Pressed);
        input.update_player(&mut position, 0.1);
        // 第一帧为 Press，不移动
        assert_eq!(position, Vector3::zeros());

        input.update_player(&mut position, 0.1);
        assert!((position.x - 0.5).abs() < 1e-6);
        assert_eq!(position.z, 0.0);
    }

    #[test]
    fn test_first_movement_key_wins() {
        let mut input = InputSystem::new();
        let mut position = Vector3::zeros();

        input.on_keyboard_input(KeyCode::KeyA, ElementState::Pressed);
        input.on_keyboard_input(KeyCode::KeyW, ElementState::Pressed);
        input.update_player(&mut position, 1.0);
        input.update_player(&mut position, 1.0);

        assert!((position.z - 5.0).abs() < 1e-6);
        assert_eq!(position.x, 0.0);
    }
}
