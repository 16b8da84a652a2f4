//! Configuration validation

use crate::schema::{RawConfig, RawEngineConfig, RawNotificationConfig};
use crate::settings::{DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_TICK_INTERVAL_SECS};
use pomo_api::DeviceType;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid server URL '{value}': {message}")]
    InvalidUrl { value: String, message: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("sync interval {sync}s must be longer than tick interval {tick}s")]
    SyncNotSlowerThanTick { sync: u64, tick: u64 },

    #[error("Invalid device type: {0}")]
    InvalidDeviceType(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &config.server.base_url
        && let Err(message) = parse_base_url(url)
    {
        errors.push(ValidationError::InvalidUrl {
            value: url.clone(),
            message,
        });
    }

    if config.server.timeout_seconds == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "server.timeout_seconds",
        });
    }

    errors.extend(validate_engine(&config.engine));
    errors.extend(validate_notifications(&config.notifications));

    if let Some(device) = &config.device.device_type
        && device.parse::<DeviceType>().is_err()
    {
        errors.push(ValidationError::InvalidDeviceType(device.clone()));
    }

    errors
}

fn validate_engine(engine: &RawEngineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let positive = [
        ("engine.tick_interval_seconds", engine.tick_interval_seconds),
        ("engine.sync_interval_seconds", engine.sync_interval_seconds),
        ("engine.persist_staleness_seconds", engine.persist_staleness_seconds),
    ];
    for (field, value) in positive {
        if value == Some(0) {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    if engine.persist_every_ticks == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "engine.persist_every_ticks",
        });
    }
    if engine.disconnected_after_failures == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "engine.disconnected_after_failures",
        });
    }

    let tick = engine
        .tick_interval_seconds
        .unwrap_or(DEFAULT_TICK_INTERVAL_SECS);
    let sync = engine
        .sync_interval_seconds
        .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
    if tick > 0 && sync > 0 && sync <= tick {
        errors.push(ValidationError::SyncNotSlowerThanTick { sync, tick });
    }

    errors
}

fn validate_notifications(notifications: &RawNotificationConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if notifications.queue_ttl_seconds == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "notifications.queue_ttl_seconds",
        });
    }

    errors
}

/// Check that a base URL is absolute http(s) with a host.
/// Returns the URL without a trailing slash.
pub fn parse_base_url(s: &str) -> Result<String, String> {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .ok_or_else(|| "Expected an http:// or https:// URL".to_string())?;

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err("Missing host".into());
    }
    if s.contains(char::is_whitespace) {
        return Err("URL must not contain whitespace".into());
    }

    Ok(s.trim_end_matches('/').to_string())
}
