//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Session sampling and stop behavior
//! - Custom pattern limits and the default owner
//! - Terminal rendering options
//!
//! Configuration is stored at `~/.config/breathroom/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::pattern::DEFAULT_MAX_CUSTOM_PATTERNS;
use crate::timer::EngineOptions;

/// Sampling interval bounds, in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 50;
pub const MAX_TICK_INTERVAL_MS: u64 = 100;

/// Session behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sampler period. Clamped to 50..=100 ms when used.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Keep the completed cycle count visible after stopping.
    #[serde(default = "default_true")]
    pub preserve_cycles_on_stop: bool,
    /// Cycle limit applied when neither the session nor the pattern sets one.
    #[serde(default)]
    pub default_max_cycles: Option<u32>,
}

/// Pattern catalog settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_max_custom_patterns")]
    pub max_custom_patterns: usize,
    /// Owner used for custom patterns and favorites by local front ends.
    #[serde(default = "default_owner")]
    pub default_owner: String,
}

/// Terminal UI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub show_progress_bar: bool,
    #[serde(default = "default_bar_width")]
    pub bar_width: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/breathroom/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

// Default functions
fn default_tick_interval_ms() -> u64 {
    MIN_TICK_INTERVAL_MS
}
fn default_true() -> bool {
    true
}
fn default_max_custom_patterns() -> usize {
    DEFAULT_MAX_CUSTOM_PATTERNS
}
fn default_owner() -> String {
    "local".into()
}
fn default_bar_width() -> u32 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            preserve_cycles_on_stop: true,
            default_max_cycles: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_custom_patterns: default_max_custom_patterns(),
            default_owner: default_owner(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_progress_bar: true,
            bar_width: default_bar_width(),
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms
                .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS),
        )
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            preserve_cycles_on_stop: self.preserve_cycles_on_stop,
            default_max_cycles: self.default_max_cycles,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = if value.eq_ignore_ascii_case("none") {
                    serde_json::Value::Null
                } else {
                    match existing {
                        serde_json::Value::Bool(_) => serde_json::Value::Bool(
                            value.parse::<bool>().map_err(|e| {
                                invalid(format!("cannot parse '{value}' as bool: {e}"))
                            })?,
                        ),
                        // Optional numbers serialize as null when unset.
                        serde_json::Value::Number(_) | serde_json::Value::Null => {
                            if let Ok(n) = value.parse::<u64>() {
                                serde_json::Value::Number(n.into())
                            } else if let Ok(n) = value.parse::<f64>() {
                                serde_json::Number::from_f64(n)
                                    .map(serde_json::Value::Number)
                                    .ok_or_else(|| {
                                        invalid(format!("cannot parse '{value}' as number"))
                                    })?
                            } else {
                                return Err(invalid(format!("cannot parse '{value}' as number")));
                            }
                        }
                        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                            serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                        }
                        _ => serde_json::Value::String(value.into()),
                    }
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some("none".into()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only.
    ///
    /// `none` clears an optional value. Unknown keys and values of the
    /// wrong type are rejected and leave the config unchanged.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Set a value by key and persist. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[session]\ntick_interval_ms = 80\n").unwrap();
        assert_eq!(parsed.session.tick_interval_ms, 80);
        assert!(parsed.session.preserve_cycles_on_stop);
        assert_eq!(parsed.catalog.max_custom_patterns, 10);
        assert_eq!(parsed.ui.bar_width, 30);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("session.tick_interval_ms").as_deref(), Some("50"));
        assert_eq!(cfg.get("session.preserve_cycles_on_stop").as_deref(), Some("true"));
        assert_eq!(cfg.get("session.default_max_cycles").as_deref(), Some("none"));
        assert_eq!(cfg.get("catalog.default_owner").as_deref(), Some("local"));
        assert!(cfg.get("ui.missing_key").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("session.preserve_cycles_on_stop", "false").unwrap();
        cfg.apply("session.default_max_cycles", "5").unwrap();
        cfg.apply("catalog.default_owner", "alice").unwrap();
        assert!(!cfg.session.preserve_cycles_on_stop);
        assert_eq!(cfg.session.default_max_cycles, Some(5));
        assert_eq!(cfg.catalog.default_owner, "alice");

        cfg.apply("session.default_max_cycles", "none").unwrap();
        assert_eq!(cfg.session.default_max_cycles, None);
    }

    #[test]
    fn apply_rejects_unknown_keys_and_bad_types() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("session.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.apply("ui.show_progress_bar", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.apply("session.tick_interval_ms", "none").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn tick_interval_is_clamped() {
        let mut session = SessionConfig::default();
        assert_eq!(session.tick_interval(), Duration::from_millis(50));
        session.tick_interval_ms = 10;
        assert_eq!(session.tick_interval(), Duration::from_millis(50));
        session.tick_interval_ms = 500;
        assert_eq!(session.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.apply("ui.bar_width", "42").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().ui.bar_width, 42);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "session = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
