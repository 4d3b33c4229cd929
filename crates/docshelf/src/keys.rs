use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub cmd: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    fn is_empty(&self) -> bool {
        *self == Modifiers::default()
    }
}

/// A key press with modifiers, written like `cmd+\` or `enter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key chord")]
    Empty,
    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    #[error("no key after modifiers in {0:?}")]
    MissingKey(String),
}

impl FromStr for KeyChord {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        // The key itself may be '+': "+" alone, or "<modifiers>++".
        let (prefix, key) = if s == "+" {
            ("", "+")
        } else if let Some(prefix) = s.strip_suffix("++") {
            (prefix, "+")
        } else {
            match s.rsplit_once('+') {
                Some((_, "")) => return Err(KeyParseError::MissingKey(s.to_string())),
                Some((prefix, key)) => (prefix, key),
                None => ("", s),
            }
        };

        let mut modifiers = Modifiers::default();
        if !prefix.is_empty() {
            for part in prefix.split('+') {
                match part.to_ascii_lowercase().as_str() {
                    "cmd" | "meta" | "super" => modifiers.cmd = true,
                    "ctrl" | "control" => modifiers.ctrl = true,
                    "alt" | "option" => modifiers.alt = true,
                    "shift" => modifiers.shift = true,
                    other => return Err(KeyParseError::UnknownModifier(other.to_string())),
                }
            }
        }

        let key = match key.to_ascii_lowercase().as_str() {
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return Err(KeyParseError::UnknownKey(key.to_string())),
                }
            }
        };
        Ok(KeyChord { key, modifiers })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (on, name) in [(m.cmd, "cmd"), (m.ctrl, "ctrl"), (m.alt, "alt"), (m.shift, "shift")] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        match self.key {
            Key::Enter => write!(f, "enter"),
            Key::Escape => write!(f, "escape"),
            Key::Char(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ToggleSidebar,
    NewDocument,
}

/// Shortcut bound to `chord`.
///
/// `Cmd+\` (or `Ctrl+\`) toggles the sidebar. A bare `Enter` creates a
/// document, but only while nothing is selected.
pub fn action_for(chord: &KeyChord, has_selection: bool) -> Option<ShortcutAction> {
    let m = &chord.modifiers;
    match chord.key {
        Key::Char('\\') if (m.cmd || m.ctrl) && !m.alt && !m.shift => {
            Some(ShortcutAction::ToggleSidebar)
        }
        Key::Enter if m.is_empty() && !has_selection => Some(ShortcutAction::NewDocument),
        _ => None,
    }
}
