//! Relay Error Types

use thiserror::Error;

/// Failures of the call/response byte transport
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport could not be opened
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The poll call itself failed
    #[error("Poll call failed: {0}")]
    Call(String),

    /// Timeout waiting for a poll response
    #[error("Timeout waiting for frame after {0}ms")]
    Timeout(u64),
}

/// Errors surfaced to callers of a [`crate::RelayHandle`]
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay loop has stopped
    #[error("Relay loop is not running")]
    Stopped,
}
