//! ECG Sampler Tier
//!
//! A periodic tick marks samples as due; a cooperative loop performs the
//! actual reads and pushes them into the acquisition ring; the poll
//! endpoint drains the ring into binary frames.

mod sampler;
mod source;

pub use sampler::{AcquisitionTicker, Sampler, SamplerConfig};
pub use source::{AnalogSource, SyntheticEcgSource};
