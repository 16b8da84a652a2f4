//! Collaborator trait interfaces for the pomosync timer engine
//!
//! This crate defines the boundary between the engine and everything it
//! talks to: the remote session gateway, notification transport, sound and
//! visibility. It contains no transport or platform code itself.

mod capabilities;
mod mock;
mod traits;

pub use capabilities::*;
pub use mock::*;
pub use traits::*;
