//! Watcher configuration, loaded from a TOML file.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a runnable configuration.
//!
//! ```toml
//! [polling]
//! period_secs = 60
//! min_delay_secs = 10
//! batch_width = 10
//! batch_pause_ms = 200
//! universe_size = 50
//! interval = "5m"
//! candle_limit = 100
//!
//! [retention]
//! active_hours = 24
//! hit_minutes = 30
//!
//! [notifications]
//! enabled = false
//! settings_file = "config.json"
//!
//! [export]
//! path = "signals.json"
//! ```

use serde::{Deserialize, Serialize};
use signalwatch_core::data::Interval;
use signalwatch_core::tracker::RetentionPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Binance rejects kline requests above this limit.
pub const MAX_CANDLE_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level watcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub polling: PollingConfig,
    pub retention: RetentionConfig,
    pub notifications: NotificationsConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Target cycle period.
    pub period_secs: u64,
    /// Minimum sleep between cycles, however long a cycle took.
    pub min_delay_secs: u64,
    /// Concurrent candle fetches per batch.
    pub batch_width: usize,
    /// Pause between fetch batches.
    pub batch_pause_ms: u64,
    /// Number of liquid pairs to scan.
    pub universe_size: usize,
    pub interval: Interval,
    pub candle_limit: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            period_secs: 60,
            min_delay_secs: 10,
            batch_width: 10,
            batch_pause_ms: 200,
            universe_size: 50,
            interval: Interval::FiveMinutes,
            candle_limit: 100,
        }
    }
}

impl PollingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.min_delay_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub active_hours: i64,
    pub hit_minutes: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            active_hours: 24,
            hit_minutes: 30,
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            active_ttl: chrono::Duration::hours(self.active_hours),
            hit_ttl: chrono::Duration::minutes(self.hit_minutes),
        }
    }
}

/// Notification settings. When `settings_file` is set, the JSON file is
/// re-read every cycle and overrides the inline values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub settings_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where the registry snapshot is written after every cycle.
    pub path: Option<PathBuf>,
}

impl WatchConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.polling;
        if p.period_secs == 0 {
            return Err(ConfigError::Invalid("polling.period_secs must be > 0".into()));
        }
        if p.batch_width == 0 {
            return Err(ConfigError::Invalid("polling.batch_width must be > 0".into()));
        }
        if p.universe_size == 0 {
            return Err(ConfigError::Invalid("polling.universe_size must be > 0".into()));
        }
        if p.candle_limit == 0 || p.candle_limit > MAX_CANDLE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "polling.candle_limit must be in 1..={MAX_CANDLE_LIMIT}, got {}",
                p.candle_limit
            )));
        }
        if self.retention.active_hours <= 0 || self.retention.hit_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "retention windows must be positive".into(),
            ));
        }
        let n = &self.notifications;
        if n.enabled
            && n.settings_file.is_none()
            && (n.bot_token.is_none() || n.chat_id.is_none())
        {
            return Err(ConfigError::Invalid(
                "notifications.enabled requires bot_token and chat_id, or a settings_file".into(),
            ));
        }
        Ok(())
    }
}
