//! Timer synchronization engine for pomosync
//!
//! This crate is the heart of pomosync, containing:
//! - Wall-clock anchored countdown with a cancellable interval scheduler
//! - Phase state machine (NOT_STARTED -> IN_PROGRESS <-> PAUSED -> COMPLETED/ABANDONED)
//! - Drift reconciliation against the server snapshot
//! - Visibility-aware completion guard and notification dispatch
//! - Best-effort persistence of the local countdown

mod countdown;
mod drift;
mod engine;
mod events;
mod guard;
mod notify;
mod persist;
mod phase;
mod schedule;

pub use countdown::*;
pub use drift::*;
pub use engine::*;
pub use events::*;
pub use guard::*;
pub use notify::*;
pub use persist::*;
pub use phase::*;
pub use schedule::*;
