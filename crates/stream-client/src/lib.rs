//! Display Client Reconstruction
//!
//! Rebuilds a display-relative timeline from relay messages into a bounded
//! buffer. The client keeps no state across reconnects: the relay decides
//! when a listener gets a snapshot and when it gets deltas.
//!
//! Deltas carry no sequence numbers. A delta lost in transit leaves a gap in
//! the timeline and is never detected or replayed; the next delta resyncs
//! because it carries its own absolute `t0`.

mod reconstructor;

pub use reconstructor::{ClientConfig, ClientPoint, ClientReconstructor};
