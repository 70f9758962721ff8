#![forbid(unsafe_code)]

//! Session configuration.
//!
//! [`SessionConfig`] gathers every tunable of an editing session into one
//! serde structure. Every field has a default, so a partial TOML or JSON
//! document only needs the values it overrides:
//!
//! ```toml
//! autosave_delay_ms = 1500
//!
//! [hotkeys]
//! save = "Ctrl+Shift+S"
//! ```
//!
//! Loading does not validate; call [`SessionConfig::validate`] (or
//! [`SessionConfig::validated`]) before use.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::hotkey::Hotkey;

use crate::autosave::AutosaveConfig;
use crate::history::HistoryConfig;

/// Shortcut strings for host-level actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub save: String,
    pub refresh: String,
    pub focus_root: String,
    pub detach: String,
    pub fullscreen: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            save: "Ctrl+S".into(),
            refresh: "F5".into(),
            focus_root: "Ctrl+R".into(),
            detach: "Ctrl+D".into(),
            fullscreen: "F11".into(),
        }
    }
}

/// Actions reachable through configured hotkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    Save,
    Refresh,
    FocusRoot,
    Detach,
    ToggleFullscreen,
}

impl HotkeyConfig {
    fn entries(&self) -> [(HotkeyAction, &'static str, &str); 5] {
        [
            (HotkeyAction::Save, "save", &self.save),
            (HotkeyAction::Refresh, "refresh", &self.refresh),
            (HotkeyAction::FocusRoot, "focus_root", &self.focus_root),
            (HotkeyAction::Detach, "detach", &self.detach),
            (HotkeyAction::ToggleFullscreen, "fullscreen", &self.fullscreen),
        ]
    }

    /// Parsed bindings in priority order. Unparseable entries are skipped.
    #[must_use]
    pub fn bindings(&self) -> Vec<(HotkeyAction, Hotkey)> {
        self.entries()
            .into_iter()
            .filter_map(|(action, name, raw)| match raw.parse::<Hotkey>() {
                Ok(hotkey) => Some((action, hotkey)),
                Err(err) => {
                    tracing::warn!(hotkey = name, raw, %err, "ignoring unparseable hotkey");
                    None
                }
            })
            .collect()
    }
}

/// Tunables for an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum undo snapshots retained.
    pub history_depth: usize,
    /// Autosave quiet period after structural mutations.
    pub autosave_delay_ms: u64,
    /// Autosave quiet period after label edits.
    pub edit_commit_delay_ms: u64,
    /// Max center-to-center distance for attaching a dragged floating node.
    pub attach_threshold_px: f64,
    /// Attach candidates are probed on every Nth drag sample.
    pub attach_probe_interval: u32,
    /// Smooth-scroll duration.
    pub scroll_duration_ms: u64,
    /// Scrolls shorter than this on both axes are skipped.
    pub scroll_skip_px: f64,
    /// How long "Auto-saved" / "Refreshed!" stay visible.
    pub status_duration_ms: u64,
    /// How long "Saved!" stays visible.
    pub saved_status_duration_ms: u64,
    /// Whether double-clicking empty canvas creates floating nodes.
    pub floating_nodes_enabled: bool,
    pub hotkeys: HotkeyConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: 50,
            autosave_delay_ms: 2000,
            edit_commit_delay_ms: 300,
            attach_threshold_px: 80.0,
            attach_probe_interval: 5,
            scroll_duration_ms: 400,
            scroll_skip_px: 5.0,
            status_duration_ms: 1500,
            saved_status_duration_ms: 2000,
            floating_nodes_enabled: true,
            hotkeys: HotkeyConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.history_depth == 0 {
            errors.push("history_depth must be > 0".into());
        }
        if self.autosave_delay_ms == 0 {
            errors.push("autosave_delay_ms must be > 0".into());
        }
        if self.edit_commit_delay_ms == 0 {
            errors.push("edit_commit_delay_ms must be > 0".into());
        }
        if !(self.attach_threshold_px > 0.0 && self.attach_threshold_px.is_finite()) {
            errors.push(format!(
                "attach_threshold_px must be > 0, got {}",
                self.attach_threshold_px
            ));
        }
        if self.attach_probe_interval == 0 {
            errors.push("attach_probe_interval must be > 0".into());
        }
        if !(self.scroll_skip_px >= 0.0 && self.scroll_skip_px.is_finite()) {
            errors.push(format!(
                "scroll_skip_px must be >= 0, got {}",
                self.scroll_skip_px
            ));
        }

        for (_, name, raw) in self.hotkeys.entries() {
            if let Err(err) = raw.parse::<Hotkey>() {
                errors.push(format!("hotkeys.{name}: {err} (\"{raw}\")"));
            }
        }

        errors
    }

    /// Validate and return `self`, or every validation error.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    #[must_use]
    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig::new(self.history_depth)
    }

    #[must_use]
    pub fn autosave_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            mutation_delay: Duration::from_millis(self.autosave_delay_ms),
            label_edit_delay: Duration::from_millis(self.edit_commit_delay_ms),
        }
    }

    #[must_use]
    pub fn scroll_duration(&self) -> Duration {
        Duration::from_millis(self.scroll_duration_ms)
    }

    #[must_use]
    pub fn status_duration(&self) -> Duration {
        Duration::from_millis(self.status_duration_ms)
    }

    #[must_use]
    pub fn saved_status_duration(&self) -> Duration {
        Duration::from_millis(self.saved_status_duration_ms)
    }
}

/// Errors from loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_validates_clean() {
        assert!(SessionConfig::default().validate().is_empty());
    }

    #[test]
    fn defaults_feed_component_configs() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.history_config().max_depth, 50);
        assert_eq!(cfg.autosave_config(), AutosaveConfig::default());
        assert_eq!(cfg.scroll_duration(), Duration::from_millis(400));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = SessionConfig::from_toml_str(
            r#"
            autosave_delay_ms = 1500

            [hotkeys]
            save = "Ctrl+Shift+S"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.autosave_delay_ms, 1500);
        assert_eq!(cfg.history_depth, 50);
        assert_eq!(cfg.hotkeys.save, "Ctrl+Shift+S");
        assert_eq!(cfg.hotkeys.refresh, "F5");
    }

    #[test]
    fn json_loads() {
        let cfg = SessionConfig::from_json_str(r#"{"attach_threshold_px": 120.0}"#).unwrap();
        assert_eq!(cfg.attach_threshold_px, 120.0);
    }

    #[test]
    fn validation_collects_every_problem() {
        let cfg = SessionConfig {
            history_depth: 0,
            attach_probe_interval: 0,
            attach_threshold_px: -1.0,
            hotkeys: HotkeyConfig {
                save: "Hyper+S".into(),
                ..HotkeyConfig::default()
            },
            ..SessionConfig::default()
        };
        let errors = cfg.validate();
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.starts_with("hotkeys.save")));
        assert!(matches!(cfg.validated(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn bindings_skip_bad_entries() {
        let hk = HotkeyConfig {
            refresh: "Nope+1".into(),
            ..HotkeyConfig::default()
        };
        let actions: Vec<_> = hk.bindings().into_iter().map(|(a, _)| a).collect();
        assert_eq!(
            actions,
            vec![
                HotkeyAction::Save,
                HotkeyAction::FocusRoot,
                HotkeyAction::Detach,
                HotkeyAction::ToggleFullscreen
            ]
        );
    }

    #[test]
    fn loads_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("session.toml");
        let mut f = std::fs::File::create(&toml_path).unwrap();
        writeln!(f, "history_depth = 10").unwrap();
        assert_eq!(
            SessionConfig::from_toml_file(&toml_path).unwrap().history_depth,
            10
        );

        let json_path = dir.path().join("session.json");
        std::fs::write(&json_path, r#"{"scroll_skip_px": 2.5}"#).unwrap();
        assert_eq!(
            SessionConfig::from_json_file(&json_path).unwrap().scroll_skip_px,
            2.5
        );

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            SessionConfig::from_toml_file(missing),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(matches!(
            SessionConfig::from_toml_str("history_depth = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
