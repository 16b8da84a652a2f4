//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Session gateway connection
    #[serde(default)]
    pub server: RawServerConfig,

    /// Timer engine tuning
    #[serde(default)]
    pub engine: RawEngineConfig,

    /// Notification and auto-start preferences
    #[serde(default)]
    pub notifications: RawNotificationConfig,

    /// Host device description
    #[serde(default)]
    pub device: RawDeviceConfig,

    /// Persistence store location
    #[serde(default)]
    pub store: RawStoreConfig,
}

/// Gateway connection settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServerConfig {
    /// Base URL of the session API (default: http://localhost:8080/api)
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,
}

/// Engine tuning. Every field falls back to the built-in default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEngineConfig {
    pub tick_interval_seconds: Option<u64>,
    pub sync_interval_seconds: Option<u64>,
    pub max_drift_seconds: Option<u64>,

    /// Server remaining above which the first sync after a start is not corrected
    pub just_started_threshold_seconds: Option<u64>,

    /// Persist local state every N ticks while running
    pub persist_every_ticks: Option<u32>,

    /// Persisted records older than this are ignored at startup
    pub persist_staleness_seconds: Option<u64>,

    /// Consecutive sync failures before reporting disconnected
    pub disconnected_after_failures: Option<u32>,
}

/// Notification preferences
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawNotificationConfig {
    pub enabled: Option<bool>,
    pub sound: Option<bool>,

    /// How long a background notification stays eligible for replay
    pub queue_ttl_seconds: Option<u64>,

    /// Resume automatically when a break phase begins
    #[serde(default)]
    pub auto_start_breaks: bool,

    /// Resume automatically when a focus phase begins
    #[serde(default)]
    pub auto_start_focus: bool,

    /// Cancellable delay before an auto-start fires
    pub auto_start_countdown_seconds: Option<u64>,
}

/// Device description
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDeviceConfig {
    /// "desktop", "mobile", or "tablet"
    #[serde(rename = "type")]
    pub device_type: Option<String>,
}

/// Store location
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStoreConfig {
    pub path: Option<PathBuf>,
}
