use std::collections::HashSet;
use std::path::PathBuf;

use super::types::{InputEvent, Key, Modifiers};

/// Per-frame input deltas.
///
/// `InputState` provides the current state (held keys, modifiers).
/// `InputFrame` provides events and transition sets for the current frame.
#[derive(Debug, Default)]
pub struct InputFrame {
    /// Raw events in arrival order.
    pub events: Vec<InputEvent>,

    /// Keys pressed this frame, with the modifiers held at press time.
    pub keys_pressed: HashSet<(Key, Modifiers)>,

    /// Files dropped onto the window this frame.
    pub dropped_files: Vec<PathBuf>,
}

impl InputFrame {
    pub fn clear(&mut self) {
        self.events.clear();
        self.keys_pressed.clear();
        self.dropped_files.clear();
    }

    pub fn push_event(&mut self, ev: InputEvent) {
        self.events.push(ev);
    }

    /// `key` was pressed this frame without any modifier.
    pub fn pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&(key, Modifiers::NONE))
    }

    /// `key` was pressed this frame together with the platform command modifier.
    pub fn pressed_with_command(&self, key: Key) -> bool {
        self.keys_pressed
            .iter()
            .any(|(k, m)| *k == key && m.command() && !m.alt)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
