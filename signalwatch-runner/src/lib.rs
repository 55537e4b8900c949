//! SignalWatch Runner: polling loop, configuration, notification delivery.
//!
//! This crate builds on `signalwatch-core` to provide:
//! - TOML watcher configuration with defaults and validation
//! - Notification settings sources (inline or the dashboard's JSON file)
//! - Telegram notification sink with threaded status updates
//! - The polling driver: batched fetches, pacing, snapshot publication

pub mod config;
pub mod driver;
pub mod settings;
pub mod telegram;

pub use config::{ConfigError, WatchConfig};
pub use driver::{export_signals, pacing_delay, Driver, DriverError, SignalBoard};
pub use settings::{JsonSettingsFile, NotificationSettings, SettingsSource, StaticSettings};
pub use telegram::TelegramSink;
