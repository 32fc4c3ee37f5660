//! Frame Error Types

use thiserror::Error;

/// Reasons a received frame is discarded.
///
/// Every variant is an integrity failure: the frame is dropped whole and
/// nothing from it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Declared sample count does not match the number of bytes received
    #[error("Frame length mismatch: count implies {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// CRC mismatch
    #[error("CRC mismatch: frame carries {expected:04X}, computed {actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Legacy hex response that does not decode
    #[error("Invalid hex response: {0}")]
    InvalidHex(String),
}
