//! Relay → Client Messages

use crate::control::FilterSettings;
use serde::{Deserialize, Serialize};

/// Parallel arrays of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSamples {
    /// Offsets from `t0_ms`
    pub t_rel_ms: Vec<u32>,
    /// Raw values
    pub value: Vec<u16>,
}

/// Full buffer contents, sent once to a listener whose display is empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Absolute time of the first sample
    pub t0_ms: u32,
    pub samples: SnapshotSamples,
    /// Current detection threshold, if the signal processor has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl SnapshotPayload {
    /// Number of samples carried
    pub fn len(&self) -> usize {
        self.samples.value.len().min(self.samples.t_rel_ms.len())
    }

    /// Check if the snapshot carries no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Samples appended since the previous publish tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaPayload {
    /// Absolute time of the first sample in this batch
    pub t0_ms: u32,
    pub value: Vec<u16>,
    /// Gap from the previous sample of this batch, 0 for the first,
    /// saturated at 255
    pub dt_ms: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl DeltaPayload {
    /// Number of samples carried
    pub fn len(&self) -> usize {
        self.value.len().min(self.dt_ms.len())
    }

    /// Check if the delta carries no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status and signal-processor output, passed through uninterpreted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaPayload {
    /// Transport status of the relay
    pub status: String,
    /// Samples in the most recent non-empty frame
    pub last_count: usize,
    pub bpm: Option<u32>,
    pub polarity: Option<i8>,
    pub sampling_rate_hz: Option<f64>,
    pub filters: FilterSettings,
    /// Status reported by the signal processor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_status: Option<String>,
    #[serde(default)]
    pub integrity_failures: u64,
    #[serde(default)]
    pub overflow_events: u64,
}

/// Every message the relay broadcasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RelayMessage {
    #[serde(rename = "ecg_frame")]
    Snapshot(SnapshotPayload),
    #[serde(rename = "ecg_delta")]
    Delta(DeltaPayload),
    #[serde(rename = "ecg_meta")]
    Meta(MetaPayload),
}
