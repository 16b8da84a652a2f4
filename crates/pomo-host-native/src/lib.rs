//! Native host collaborators for pomosync
//!
//! Provides:
//! - HTTP session gateway (reqwest)
//! - Desktop notifications via notify-send, with a terminal fallback
//! - Completion sounds with auto-detection of sound systems
//! - Manually toggled visibility for terminal front ends

mod desktop;
mod gateway;
mod visibility;

pub use desktop::*;
pub use gateway::*;
pub use visibility::*;
