//! Poll-Side Frame Encoder

use crate::frame::{encode_samples, MAX_SAMPLES_PER_FRAME};
use ring_buffer::AcquisitionRing;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds one frame per poll from the unread part of an acquisition ring.
///
/// Each call takes at most [`MAX_SAMPLES_PER_FRAME`] samples; anything
/// beyond that stays queued for the next poll. The encoder never waits for
/// new samples.
#[derive(Clone)]
pub struct FrameEncoder {
    ring: Arc<AcquisitionRing>,
}

impl FrameEncoder {
    /// Create an encoder reading from `ring`
    pub fn new(ring: Arc<AcquisitionRing>) -> Self {
        Self { ring }
    }

    /// Drain pending samples into a frame.
    ///
    /// Returns the one-byte empty frame when nothing is pending.
    pub fn build_frame(&self) -> Vec<u8> {
        let drained = self.ring.drain(MAX_SAMPLES_PER_FRAME);
        if drained.overflow {
            warn!("Acquisition ring overflowed since last poll, marking frame");
        }

        let remaining = self.ring.unread();
        if remaining > 0 {
            debug!(
                "Frame clamped to {} samples, {} deferred to next poll",
                drained.samples.len(),
                remaining
            );
        }

        encode_samples(&drained.samples, drained.overflow)
    }

    /// Bytes returned by the poll call: zero-length when nothing is pending
    pub fn poll_response(&self) -> Vec<u8> {
        let frame = self.build_frame();
        if frame == [0] {
            Vec::new()
        } else {
            frame
        }
    }

    /// The ring this encoder drains
    pub fn ring(&self) -> &Arc<AcquisitionRing> {
        &self.ring
    }
}
