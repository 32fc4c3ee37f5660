//! Relay configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Interval between poll calls to the sampler (milliseconds)
    pub poll_interval_ms: u64,

    /// Interval between delta publishes (milliseconds)
    pub publish_interval_ms: u64,

    /// Relay ring capacity in samples (20s at 200Hz)
    pub buffer_capacity: usize,

    /// Messages a listener may fall behind before it starts missing deltas
    pub broadcast_capacity: usize,

    /// Queued control commands
    pub command_capacity: usize,

    /// Poll call timeout (milliseconds)
    pub poll_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            publish_interval_ms: 100,
            buffer_capacity: 4000,
            broadcast_capacity: 64,
            command_capacity: 32,
            poll_timeout_ms: 500,
        }
    }
}

impl RelayConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Publish interval as a duration
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms.max(1))
    }

    /// Poll timeout as a duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }
}
