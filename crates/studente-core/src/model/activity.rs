// ── User activity ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

/// Latest activity signals reported by the tracker.
///
/// `keyboard`, `mouse_movement`, `mouse_click` and `audio` are momentary:
/// they light up on an activity event and are cleared again by the
/// dashboard's pulse timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityStatus {
    pub keyboard: bool,
    pub mouse_movement: bool,
    pub mouse_click: bool,
    pub screen: bool,
    pub audio: bool,
    pub active_window: String,

    /// Any momentary signal is currently lit.
    #[serde(skip)]
    pub user_active: bool,
}

/// Activity event names carried in `content.activity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    KeyboardActivity,
    MouseMovement,
    MouseClick,
    AudioPlayback,
    #[strum(default)]
    Other(String),
}

impl ActivityKind {
    pub fn parse(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| Self::Other(name.to_owned()))
    }

    /// Wire name, e.g. `MOUSE_CLICK`.
    pub fn name(&self) -> &str {
        match self {
            Self::KeyboardActivity => "KEYBOARD_ACTIVITY",
            Self::MouseMovement => "MOUSE_MOVEMENT",
            Self::MouseClick => "MOUSE_CLICK",
            Self::AudioPlayback => "AUDIO_PLAYBACK",
            Self::Other(name) => name,
        }
    }
}

impl ActivityStatus {
    /// Light the flag for `kind` and clear the other momentary flags.
    pub fn pulse(&mut self, kind: &ActivityKind) {
        self.keyboard = matches!(kind, ActivityKind::KeyboardActivity);
        self.mouse_movement = matches!(kind, ActivityKind::MouseMovement);
        self.mouse_click = matches!(kind, ActivityKind::MouseClick);
        self.audio = matches!(kind, ActivityKind::AudioPlayback);
        self.user_active = true;
    }

    /// End of the pulse window.
    pub fn clear_pulse(&mut self) {
        self.keyboard = false;
        self.mouse_movement = false;
        self.mouse_click = false;
        self.audio = false;
        self.user_active = false;
    }

    /// Overlay the fields present in `patch`.
    ///
    /// Unknown keys are ignored. A patch whose known keys have the wrong
    /// JSON type is rejected as a whole and `self` is left untouched.
    pub fn merge(&mut self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let mut current = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }

        let user_active = self.user_active;
        *self = serde_json::from_value(Value::Object(current))?;
        self.user_active = user_active;
        Ok(())
    }
}
