//! Host capabilities model

use pomo_api::DeviceType;
use serde::{Deserialize, Serialize};

/// Describes what the host can do for completion alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Form factor, drives the dispatch matrix
    pub device_type: DeviceType,

    /// Native push notifications are available at all
    pub push_supported: bool,

    /// A sound device is available
    pub sound_supported: bool,
}

impl HostCapabilities {
    /// Nothing beyond the in-app view
    pub fn minimal() -> Self {
        Self {
            device_type: DeviceType::Desktop,
            push_supported: false,
            sound_supported: false,
        }
    }

    /// A fully capable host of the given form factor
    pub fn full(device_type: DeviceType) -> Self {
        Self {
            device_type,
            push_supported: true,
            sound_supported: true,
        }
    }

    pub fn is_handheld(&self) -> bool {
        self.device_type.is_handheld()
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::full(DeviceType::Desktop)
    }
}
