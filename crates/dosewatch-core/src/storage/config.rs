//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Reminder horizons and tick cadence
//! - Notification preferences
//! - Adherence band thresholds
//! - Log filter
//!
//! Configuration is stored at `~/.config/dosewatch/config.toml`.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::reminder::{WindowPolicy, ALERT_LEAD_MIN, UPCOMING_HORIZON_MIN};
use crate::stats::AdherenceAnalyzer;

/// Reminder windows and tick cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_upcoming_horizon_min")]
    pub upcoming_horizon_min: u32,
    #[serde(default = "default_alert_lead_min")]
    pub alert_lead_min: u32,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Re-read the store on every tick (picks up edits made elsewhere).
    #[serde(default)]
    pub reload_on_tick: bool,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// When false the host notifier is never asked; reminders are still tracked.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Adherence band thresholds (percent, inclusive lower bounds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceConfig {
    #[serde(default = "default_good_threshold")]
    pub good_threshold: u32,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dosewatch/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub adherence: AdherenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_upcoming_horizon_min() -> u32 {
    UPCOMING_HORIZON_MIN as u32
}
fn default_alert_lead_min() -> u32 {
    ALERT_LEAD_MIN as u32
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_good_threshold() -> u32 {
    80
}
fn default_warning_threshold() -> u32 {
    60
}
fn default_log_filter() -> String {
    "warn".into()
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            upcoming_horizon_min: default_upcoming_horizon_min(),
            alert_lead_min: default_alert_lead_min(),
            tick_interval_secs: default_tick_interval_secs(),
            reload_on_tick: false,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for AdherenceConfig {
    fn default() -> Self {
        Self {
            good_threshold: default_good_threshold(),
            warning_threshold: default_warning_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
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
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("cannot replace a whole section".into()));
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
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

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.reminders.upcoming_horizon_min == 0 {
            return Err(invalid("reminders.upcoming_horizon_min", "must be at least 1"));
        }
        if self.reminders.alert_lead_min == 0 {
            return Err(invalid("reminders.alert_lead_min", "must be at least 1"));
        }
        if self.reminders.tick_interval_secs == 0 {
            return Err(invalid("reminders.tick_interval_secs", "must be at least 1"));
        }
        if self.adherence.good_threshold > 100 {
            return Err(invalid("adherence.good_threshold", "must be at most 100"));
        }
        if self.adherence.warning_threshold > self.adherence.good_threshold {
            return Err(invalid(
                "adherence.warning_threshold",
                "must not exceed adherence.good_threshold",
            ));
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result fails validation. `self` is unchanged on error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::new(
            Duration::minutes(self.reminders.upcoming_horizon_min as i64),
            Duration::minutes(self.reminders.alert_lead_min as i64),
        )
    }

    pub fn adherence_analyzer(&self) -> AdherenceAnalyzer {
        AdherenceAnalyzer::with_thresholds(
            self.adherence.good_threshold,
            self.adherence.warning_threshold,
        )
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
