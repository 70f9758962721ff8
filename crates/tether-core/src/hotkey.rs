#![forbid(unsafe_code)]

//! Configurable shortcut strings such as `"Ctrl+S"` or `"F5"`.
//!
//! A hotkey is a `+`-separated list of modifier names followed by one key
//! name. Matching rules:
//!
//! - `Ctrl`, `Cmd`, and `Meta` are interchangeable: the shortcut requires
//!   "Ctrl or Meta" held, and an event with either satisfies it.
//! - `Shift` and `Alt` must match exactly (held iff named).
//! - Function keys (`F1`..`F24`) compare exactly.
//! - Every other key compares case-insensitively.
//!
//! # Example
//!
//! ```
//! use tether_core::event::{KeyCode, KeyEvent, Modifiers};
//! use tether_core::hotkey::Hotkey;
//!
//! let save: Hotkey = "Ctrl+S".parse().unwrap();
//! let ev = KeyEvent::new(KeyCode::Char('s')).with_modifiers(Modifiers::SUPER);
//! assert!(save.matches(&ev));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::event::{KeyCode, KeyEvent};

/// The non-modifier part of a hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyKey {
    /// Function key F1-F24.
    Function(u8),
    /// A named non-character key (Enter, Tab, arrows, ...).
    Named(KeyCode),
    /// A character key, stored lowercased.
    Char(char),
}

/// A parsed shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    key: HotkeyKey,
    command: bool,
    shift: bool,
    alt: bool,
}

/// Error returned when a hotkey string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyParseError {
    /// The string was empty or only separators.
    Empty,
    /// A modifier name was not recognized.
    UnknownModifier(String),
    /// The key name was not recognized.
    UnknownKey(String),
}

impl fmt::Display for HotkeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty hotkey"),
            Self::UnknownModifier(m) => write!(f, "unknown modifier: {m}"),
            Self::UnknownKey(k) => write!(f, "unknown key: {k}"),
        }
    }
}

impl std::error::Error for HotkeyParseError {}

impl Hotkey {
    /// A shortcut requiring Ctrl (or Meta) plus `c`.
    #[must_use]
    pub fn command(c: char) -> Self {
        Self {
            key: HotkeyKey::Char(c.to_ascii_lowercase()),
            command: true,
            shift: false,
            alt: false,
        }
    }

    /// A bare function key.
    #[must_use]
    pub const fn function(n: u8) -> Self {
        Self {
            key: HotkeyKey::Function(n),
            command: false,
            shift: false,
            alt: false,
        }
    }

    /// The key part.
    #[must_use]
    pub const fn key(&self) -> HotkeyKey {
        self.key
    }

    /// Whether Ctrl/Meta is required.
    #[must_use]
    pub const fn requires_command(&self) -> bool {
        self.command
    }

    /// Whether `event` triggers this shortcut.
    #[must_use]
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if !event.is_press() {
            return false;
        }
        if event.command() != self.command || event.shift() != self.shift || event.alt() != self.alt
        {
            return false;
        }
        match (self.key, event.code) {
            (HotkeyKey::Function(n), KeyCode::F(m)) => n == m,
            (HotkeyKey::Char(c), KeyCode::Char(ch)) => ch.to_lowercase().eq(std::iter::once(c)),
            (HotkeyKey::Named(code), other) => code == other,
            _ => false,
        }
    }
}

fn parse_key(name: &str) -> Result<HotkeyKey, HotkeyParseError> {
    // Function keys compare exactly, so "f5" is not F5.
    if let Some(digits) = name.strip_prefix('F')
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
    {
        return match digits.parse::<u8>() {
            Ok(n @ 1..=24) => Ok(HotkeyKey::Function(n)),
            _ => Err(HotkeyParseError::UnknownKey(name.to_string())),
        };
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(HotkeyKey::Char(c.to_ascii_lowercase()));
    }

    let named = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Escape,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "up" | "arrowup" => KeyCode::Up,
        "down" | "arrowdown" => KeyCode::Down,
        "left" | "arrowleft" => KeyCode::Left,
        "right" | "arrowright" => KeyCode::Right,
        "space" => return Ok(HotkeyKey::Char(' ')),
        _ => return Err(HotkeyParseError::UnknownKey(name.to_string())),
    };
    Ok(HotkeyKey::Named(named))
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key_name, modifiers)) = parts.split_last() else {
            return Err(HotkeyParseError::Empty);
        };
        if key_name.is_empty() {
            return Err(HotkeyParseError::Empty);
        }

        let mut hotkey = Hotkey {
            key: parse_key(key_name)?,
            command: false,
            shift: false,
            alt: false,
        };
        for m in modifiers {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" | "cmd" | "meta" | "super" => hotkey.command = true,
                "shift" => hotkey.shift = true,
                "alt" | "option" => hotkey.alt = true,
                _ => return Err(HotkeyParseError::UnknownModifier((*m).to_string())),
            }
        }
        Ok(hotkey)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.command {
            f.write_str("Ctrl+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        match self.key {
            HotkeyKey::Function(n) => write!(f, "F{n}"),
            HotkeyKey::Char(' ') => f.write_str("Space"),
            HotkeyKey::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            HotkeyKey::Named(code) => write!(f, "{code:?}"),
        }
    }
}

impl Serialize for Hotkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hotkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
