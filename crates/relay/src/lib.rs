//! ECG Relay
//!
//! Polls the sampler for frames, validates and re-buffers them, and
//! publishes snapshots and incremental deltas to any number of listeners:
//!
//! - Frame ingest with integrity accounting
//! - Fixed-cadence delta publishing decoupled from polling
//! - Opaque signal-processor output merged into meta messages
//! - A single cooperative loop that owns all relay state

mod config;
mod error;
mod ingest;
mod processor;
mod publisher;
mod relay;
mod source;

pub use config::RelayConfig;
pub use error::{RelayError, TransportError};
pub use ingest::{DecodeStats, FrameIngest};
pub use processor::{DspOutput, PassthroughProcessor, SignalProcessor};
pub use publisher::DeltaPublisher;
pub use relay::{Relay, RelayHandle, Subscription};
pub use source::{FrameSource, LoopbackSource};
