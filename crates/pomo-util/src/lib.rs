//! Shared utilities for pomosync
//!
//! This crate provides:
//! - ID types (ActivityId, SessionId, NotificationId)
//! - Wall-clock time helpers with debug mock time
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
