//! Default paths for pomosync components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/pomosync/config.toml` or `~/.config/pomosync/config.toml`
//! - Data: `$XDG_DATA_HOME/pomosync` or `~/.local/share/pomosync`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const POMO_CONFIG_ENV: &str = "POMO_CONFIG";

/// Environment variable for overriding the data directory
pub const POMO_DATA_DIR_ENV: &str = "POMO_DATA_DIR";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
const STORE_FILENAME: &str = "pomosync.db";

/// Application subdirectory name
const APP_DIR: &str = "pomosync";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$POMO_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/pomosync/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/pomosync/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(POMO_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/tmp").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$POMO_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/pomosync` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/pomosync` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(POMO_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking POMO_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Default location of the timer persistence database inside `data_dir`.
pub fn default_store_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(STORE_FILENAME)
}
