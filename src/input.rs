use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::state::{CullMode, FilteringMode};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "Home" => Home,
        "End" => End,
        "PageUp" => PageUp,
        "PageDown" => PageDown,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        "LeftAlt" | "LAlt" => LeftAlt,
        "RightAlt" | "RAlt" => RightAlt,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for keys without a printable character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    Home,
    End,
    PageUp,
    PageDown,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
}

/// Input delivered by the window host, already stripped of platform types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    /// Press edge of a key. Releases are never delivered.
    KeyPressed(KeyCode),
    /// Absolute cursor position in window pixels, y growing downward.
    PointerMoved(Vec2),
    /// Relative pointer motion while the cursor is locked, y growing downward.
    PointerDelta(Vec2),
    /// Vertical scroll in lines, positive away from the user.
    Scroll(f32),
}

/// What a key press asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    Close,
    /// Zero based shader slot.
    SelectVariant(usize),
    SetFiltering(FilteringMode),
    SetCulling(CullMode),
    SetAntialiasing(bool),
    ToggleAntialiasing,
}

impl KeyAction {
    /// Parses names such as `close`, `variant-2`, `filter-point`, `cull-back`
    /// or `antialiasing-on`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if let Some(slot) = name.strip_prefix("variant-") {
            let slot = slot.parse::<usize>().ok()?;
            return (slot >= 1).then(|| Self::SelectVariant(slot - 1));
        }
        if let Some(mode) = name.strip_prefix("filter-") {
            return FilteringMode::from_name(mode).map(Self::SetFiltering);
        }
        if let Some(mode) = name.strip_prefix("cull-") {
            return CullMode::from_name(mode).map(Self::SetCulling);
        }
        match name.as_str() {
            "close" | "quit" => Some(Self::Close),
            "antialiasing-on" => Some(Self::SetAntialiasing(true)),
            "antialiasing-off" => Some(Self::SetAntialiasing(false)),
            "toggle-antialiasing" => Some(Self::ToggleAntialiasing),
            _ => None,
        }
    }
}

/// Key to action table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, KeyAction>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut bindings = HashMap::from([
            (KeyCode::Named(NamedKey::Escape), KeyAction::Close),
            (
                KeyCode::Character('Q'),
                KeyAction::SetFiltering(FilteringMode::Point),
            ),
            (
                KeyCode::Character('W'),
                KeyAction::SetFiltering(FilteringMode::Bilinear),
            ),
            (
                KeyCode::Character('E'),
                KeyAction::SetFiltering(FilteringMode::Trilinear),
            ),
            (
                KeyCode::Character('R'),
                KeyAction::SetFiltering(FilteringMode::Anisotropic),
            ),
            (KeyCode::Character('A'), KeyAction::SetCulling(CullMode::Back)),
            (
                KeyCode::Character('S'),
                KeyAction::SetCulling(CullMode::Disabled),
            ),
            (KeyCode::Character('Z'), KeyAction::SetAntialiasing(false)),
            (KeyCode::Character('X'), KeyAction::SetAntialiasing(true)),
            (KeyCode::Character('M'), KeyAction::ToggleAntialiasing),
        ]);
        for digit in 1..=4u8 {
            bindings.insert(
                KeyCode::Digit(digit),
                KeyAction::SelectVariant(usize::from(digit - 1)),
            );
        }
        Self { bindings }
    }
}

impl KeyBindings {
    /// Default table with `overrides` applied on top.
    pub fn with_overrides(overrides: &[(KeyCode, KeyAction)]) -> Self {
        let mut bindings = Self::default();
        for (key, action) in overrides {
            bindings.bind(*key, *action);
        }
        bindings
    }

    pub fn bind(&mut self, key: KeyCode, action: KeyAction) {
        self.bindings.insert(key, action);
    }

    pub fn lookup(&self, key: KeyCode) -> Option<KeyAction> {
        self.bindings.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Space"),
            Some(KeyCode::Named(NamedKey::Space))
        );
        assert_eq!(KeyCode::from_name("a"), Some(KeyCode::Character('A')));
        assert_eq!(KeyCode::from_name("7"), Some(KeyCode::Digit(7)));
        assert_eq!(KeyCode::from_name("F12"), Some(KeyCode::Function(12)));
        assert_eq!(KeyCode::from_name("F26"), None);
        assert_eq!(KeyCode::from_name(""), None);
        assert_eq!(KeyCode::from_name("ab"), None);
    }

    #[test]
    fn parses_action_names() {
        assert_eq!(
            KeyAction::from_name("variant-2"),
            Some(KeyAction::SelectVariant(1))
        );
        assert_eq!(KeyAction::from_name("variant-0"), None);
        assert_eq!(
            KeyAction::from_name("filter-bilinear"),
            Some(KeyAction::SetFiltering(FilteringMode::Bilinear))
        );
        assert_eq!(
            KeyAction::from_name("Cull-Back"),
            Some(KeyAction::SetCulling(CullMode::Back))
        );
        assert_eq!(KeyAction::from_name("explode"), None);
    }

    #[test]
    fn default_table_matches_viewer_keys() {
        let bindings = KeyBindings::default();
        assert_eq!(
            bindings.lookup(KeyCode::Named(NamedKey::Escape)),
            Some(KeyAction::Close)
        );
        assert_eq!(
            bindings.lookup(KeyCode::Digit(4)),
            Some(KeyAction::SelectVariant(3))
        );
        assert_eq!(bindings.lookup(KeyCode::Digit(5)), None);
        assert_eq!(
            bindings.lookup(KeyCode::Character('X')),
            Some(KeyAction::SetAntialiasing(true))
        );
    }

    #[test]
    fn overrides_replace_defaults() {
        let bindings =
            KeyBindings::with_overrides(&[(KeyCode::Character('Q'), KeyAction::Close)]);
        assert_eq!(
            bindings.lookup(KeyCode::Character('Q')),
            Some(KeyAction::Close)
        );
        assert_eq!(
            bindings.lookup(KeyCode::Named(NamedKey::Escape)),
            Some(KeyAction::Close)
        );
    }
}
