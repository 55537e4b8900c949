//! Notification settings sources, consulted once per cycle.

use crate::config::NotificationsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key under which the dashboard stores notification settings.
pub const SETTINGS_KEY: &str = "telegram_config";

/// Telegram credentials plus the on/off switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

impl NotificationSettings {
    /// Enabled and carrying both credentials.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

pub trait SettingsSource: Send + Sync {
    fn notification_settings(&self) -> NotificationSettings;
}

/// Settings fixed at startup from the TOML config.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub NotificationSettings);

impl StaticSettings {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self(NotificationSettings {
            enabled: config.enabled,
            bot_token: config.bot_token.clone().unwrap_or_default(),
            chat_id: config.chat_id.clone().unwrap_or_default(),
        })
    }
}

impl SettingsSource for StaticSettings {
    fn notification_settings(&self) -> NotificationSettings {
        self.0.clone()
    }
}

/// Settings read from the dashboard's JSON key/value file on every call, so
/// edits take effect on the next cycle. A missing or unreadable file, or a
/// missing key, means notifications are off.
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Option<NotificationSettings> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot read settings file");
                return None;
            }
        };
        let mut doc: serde_json::Map<String, serde_json::Value> =
            match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "settings file is not a JSON object");
                    return None;
                }
            };
        let value = doc.remove(SETTINGS_KEY)?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!(key = SETTINGS_KEY, error = %err, "malformed notification settings");
                None
            }
        }
    }
}

impl SettingsSource for JsonSettingsFile {
    fn notification_settings(&self) -> NotificationSettings {
        self.load().unwrap_or_default()
    }
}

/// Pick the source described by the config: the JSON file when one is
/// named, otherwise the inline values.
pub fn from_config(config: &NotificationsConfig) -> Box<dyn SettingsSource> {
    match &config.settings_file {
        Some(path) => Box::new(JsonSettingsFile::new(path)),
        None => Box::new(StaticSettings::from_config(config)),
    }
}
