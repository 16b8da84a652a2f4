//! Validated settings structures

use crate::schema::{
    RawConfig, RawEngineConfig, RawNotificationConfig, RawServerConfig,
};
use crate::validation::parse_base_url;
use pomo_api::{DeviceType, Phase};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_MAX_DRIFT_SECS: u64 = 3;
pub const DEFAULT_JUST_STARTED_THRESHOLD_SECS: u64 = 55;
pub const DEFAULT_PERSIST_EVERY_TICKS: u32 = 5;
pub const DEFAULT_PERSIST_STALENESS_SECS: u64 = 5 * 60;
pub const DEFAULT_DISCONNECTED_AFTER_FAILURES: u32 = 3;
pub const DEFAULT_QUEUE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_AUTO_START_COUNTDOWN_SECS: u64 = 5;

/// Validated settings ready for use by the engine and the runtime
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub engine: EngineSettings,
    pub notifications: NotificationSettings,
    pub device: DeviceType,

    /// Explicit store path. None means the default inside the data dir.
    pub store_path: Option<PathBuf>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            server: ServerConfig::from_raw(raw.server),
            engine: EngineSettings::from_raw(raw.engine),
            notifications: NotificationSettings::from_raw(raw.notifications),
            device: raw
                .device
                .device_type
                .and_then(|d| d.parse().ok())
                .unwrap_or_default(),
            store_path: raw.store.path,
        }
    }
}

/// Session gateway connection
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ServerConfig {
    fn from_raw(raw: RawServerConfig) -> Self {
        Self {
            base_url: raw
                .base_url
                .and_then(|u| parse_base_url(&u).ok())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token: raw.token.filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(raw.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Timer engine tuning
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub sync_interval: Duration,
    pub max_drift_secs: u64,
    pub just_started_threshold_secs: u64,
    pub persist_every_ticks: u32,
    pub persist_staleness: Duration,
    pub disconnected_after_failures: u32,
}

impl EngineSettings {
    fn from_raw(raw: RawEngineConfig) -> Self {
        Self {
            tick_interval: Duration::from_secs(
                raw.tick_interval_seconds
                    .unwrap_or(DEFAULT_TICK_INTERVAL_SECS),
            ),
            sync_interval: Duration::from_secs(
                raw.sync_interval_seconds
                    .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
            ),
            max_drift_secs: raw.max_drift_seconds.unwrap_or(DEFAULT_MAX_DRIFT_SECS),
            just_started_threshold_secs: raw
                .just_started_threshold_seconds
                .unwrap_or(DEFAULT_JUST_STARTED_THRESHOLD_SECS),
            persist_every_ticks: raw
                .persist_every_ticks
                .unwrap_or(DEFAULT_PERSIST_EVERY_TICKS),
            persist_staleness: Duration::from_secs(
                raw.persist_staleness_seconds
                    .unwrap_or(DEFAULT_PERSIST_STALENESS_SECS),
            ),
            disconnected_after_failures: raw
                .disconnected_after_failures
                .unwrap_or(DEFAULT_DISCONNECTED_AFTER_FAILURES),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_raw(RawEngineConfig::default())
    }
}

/// Notification and auto-start preferences
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub sound: bool,
    pub queue_ttl: Duration,
    pub auto_start: AutoStartPolicy,
}

impl NotificationSettings {
    fn from_raw(raw: RawNotificationConfig) -> Self {
        Self {
            enabled: raw.enabled.unwrap_or(true),
            sound: raw.sound.unwrap_or(true),
            queue_ttl: Duration::from_secs(raw.queue_ttl_seconds.unwrap_or(DEFAULT_QUEUE_TTL_SECS)),
            auto_start: AutoStartPolicy {
                breaks: raw.auto_start_breaks,
                focus: raw.auto_start_focus,
                countdown: Duration::from_secs(
                    raw.auto_start_countdown_seconds
                        .unwrap_or(DEFAULT_AUTO_START_COUNTDOWN_SECS),
                ),
            },
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self::from_raw(RawNotificationConfig::default())
    }
}

/// Whether the next phase starts on its own after a completion
#[derive(Debug, Clone, Default)]
pub struct AutoStartPolicy {
    pub breaks: bool,
    pub focus: bool,
    pub countdown: Duration,
}

impl AutoStartPolicy {
    /// Whether a phase that has just begun should be resumed automatically
    pub fn applies_to(&self, phase: Phase) -> bool {
        if phase.is_break() { self.breaks } else { self.focus }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.engine.sync_interval, Duration::from_secs(15));
        assert_eq!(settings.engine.max_drift_secs, 3);
        assert_eq!(settings.engine.just_started_threshold_secs, 55);
        assert_eq!(settings.engine.persist_every_ticks, 5);
        assert_eq!(settings.engine.persist_staleness, Duration::from_secs(300));
        assert_eq!(settings.notifications.queue_ttl, Duration::from_secs(1800));
        assert!(settings.notifications.enabled);
        assert_eq!(settings.device, DeviceType::Desktop);
        assert_eq!(settings.server.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_auto_start_policy() {
        let policy = AutoStartPolicy {
            breaks: true,
            focus: false,
            countdown: Duration::from_secs(5),
        };

        assert!(policy.applies_to(Phase::Break));
        assert!(policy.applies_to(Phase::LongBreak));
        assert!(!policy.applies_to(Phase::Focus));
    }

    #[test]
    fn test_empty_token_is_none() {
        let server = ServerConfig::from_raw(RawServerConfig {
            base_url: Some("https://pomo.example.com/api/".into()),
            token: Some(String::new()),
            timeout_seconds: None,
        });
        assert!(server.token.is_none());
        assert_eq!(server.base_url, "https://pomo.example.com/api");
    }
}
