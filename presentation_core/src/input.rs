// Keyboard and pointer bindings.
// Space toggles, R restarts, arrows step; a click outside the controls advances.

use serde::{Deserialize, Serialize};

/// A user-facing control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    TogglePlayPause,
    Restart,
    Next,
    Previous,
}

impl ControlAction {
    /// Map a `KeyboardEvent.code` value to an action.
    pub fn from_key_code(code: &str) -> Option<Self> {
        match code {
            "Space" => Some(ControlAction::TogglePlayPause),
            "KeyR" => Some(ControlAction::Restart),
            "ArrowLeft" => Some(ControlAction::Previous),
            "ArrowRight" => Some(ControlAction::Next),
            _ => None,
        }
    }

    /// Map a document click. Clicks inside the controls region belong to the buttons.
    pub fn from_click(inside_controls: bool) -> Option<Self> {
        if inside_controls {
            None
        } else {
            Some(ControlAction::Next)
        }
    }

    /// Whether the browser's default handling of the key must be suppressed
    /// (Space would otherwise scroll the page).
    pub fn suppresses_key_default(&self) -> bool {
        matches!(self, ControlAction::TogglePlayPause)
    }
}
