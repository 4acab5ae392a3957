// Keyboard input tracking
// Abstracts winit key events into a per-frame game pad snapshot

use std::collections::HashSet;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Snapshot of the virtual game pad: d-pad plus three buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GamePad(u8);

impl GamePad {
    pub const UP: GamePad = GamePad(1 << 0);
    pub const DOWN: GamePad = GamePad(1 << 1);
    pub const LEFT: GamePad = GamePad(1 << 2);
    pub const RIGHT: GamePad = GamePad(1 << 3);
    pub const A: GamePad = GamePad(1 << 4);
    pub const B: GamePad = GamePad(1 << 5);
    pub const START: GamePad = GamePad(1 << 6);

    pub const fn empty() -> Self {
        GamePad(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `buttons` is held.
    pub const fn contains(self, buttons: GamePad) -> bool {
        self.0 & buttons.0 == buttons.0
    }

    pub fn insert(&mut self, buttons: GamePad) {
        self.0 |= buttons.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for GamePad {
    type Output = GamePad;

    fn bitor(self, rhs: GamePad) -> GamePad {
        GamePad(self.0 | rhs.0)
    }
}

/// Default key mapping: arrows or WASD for the d-pad, Space/Z for A,
/// X for B, Enter for Start.
fn pad_bits(key: KeyCode) -> GamePad {
    match key {
        KeyCode::ArrowUp | KeyCode::KeyW => GamePad::UP,
        KeyCode::ArrowDown | KeyCode::KeyS => GamePad::DOWN,
        KeyCode::ArrowLeft | KeyCode::KeyA => GamePad::LEFT,
        KeyCode::ArrowRight | KeyCode::KeyD => GamePad::RIGHT,
        KeyCode::Space | KeyCode::KeyZ => GamePad::A,
        KeyCode::KeyX => GamePad::B,
        KeyCode::Enter => GamePad::START,
        _ => GamePad::empty(),
    }
}

#[derive(Debug, Default)]
pub struct InputState {
    keys_held: HashSet<KeyCode>,
    // Keys that went down since the last end_frame()
    keys_pressed: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a winit WindowEvent into the input state.
    pub fn process_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if let PhysicalKey::Code(key) = event.physical_key {
                self.set_key(key, event.state);
            }
        }
    }

    pub fn set_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if self.keys_held.insert(key) {
                    self.keys_pressed.insert(key);
                }
            }
            ElementState::Released => { self.keys_held.remove(&key); }
        }
    }

    /// Call once per frame after the game has consumed input.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// True only on the frame the key went down (no key repeat).
    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Current game pad state from the held keys.
    pub fn game_pad(&self) -> GamePad {
        self.keys_held
            .iter()
            .fold(GamePad::empty(), |pad, &key| pad | pad_bits(key))
    }
}
