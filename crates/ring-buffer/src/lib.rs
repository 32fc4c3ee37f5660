//! Bounded Ring Buffers
//!
//! Provides the fixed-capacity stores used at every tier of the ECG stream:
//! the lock-free acquisition ring written by the sampler tick and drained by
//! the poll handler, and a single-owner history ring used by the relay and
//! display buffers.

mod buffer;
mod history;

pub use buffer::{AcquisitionRing, Drained, DEFAULT_CAPACITY};
pub use history::HistoryRing;

use serde::{Deserialize, Serialize};

/// One acquired ECG sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Raw ADC reading
    pub value: u16,
    /// Absolute sampler time in milliseconds (wraps like `millis()`)
    pub timestamp_ms: u32,
}

impl Sample {
    /// Create a new sample
    pub fn new(value: u16, timestamp_ms: u32) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }

    /// Pack into a single word so a slot can be stored atomically
    pub(crate) fn pack(self) -> u64 {
        ((self.value as u64) << 32) | self.timestamp_ms as u64
    }

    pub(crate) fn unpack(word: u64) -> Self {
        Self {
            value: (word >> 32) as u16,
            timestamp_ms: word as u32,
        }
    }
}
