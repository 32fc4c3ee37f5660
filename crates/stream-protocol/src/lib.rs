//! Relay-to-Client Stream Protocol
//!
//! JSON messages exchanged between the relay and display clients. Every
//! message is an `{"event": ..., "data": ...}` envelope.

mod control;
mod message;

pub use control::{ControlReply, ControlRequest, FilterSettings, FilterUpdate, StatusReply};
pub use message::{DeltaPayload, MetaPayload, RelayMessage, SnapshotPayload, SnapshotSamples};

/// Largest per-sample delta carried in a [`DeltaPayload`]
pub const MAX_DELTA_DT_MS: u32 = 255;
