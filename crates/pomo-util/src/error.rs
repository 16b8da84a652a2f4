//! Error types for pomosync

use thiserror::Error;

/// Core error type for engine operations
#[derive(Debug, Error)]
pub enum PomoError {
    #[error("Cannot {action} while session is {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("Session is not editable while {0}")]
    NotEditable(String),

    #[error("Session has already ended")]
    SessionEnded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PomoError {
    pub fn invalid_transition(action: &'static str, state: impl ToString) -> Self {
        Self::InvalidTransition {
            action,
            state: state.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::GatewayError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PomoError>;
