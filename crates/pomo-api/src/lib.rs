//! Shared data types for pomosync
//!
//! This crate defines the types exchanged between the session gateway,
//! the timer engine, and its observers:
//! - Session status, phases, and the authoritative timer snapshot
//! - Notification context and device classes
//! - The published timer view

mod events;
mod types;

pub use events::*;
pub use types::*;
