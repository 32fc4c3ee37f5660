//! Frame Ingest

use frame_codec::{decode_response, DecodedFrame, FrameError};
use metrics::counter;
use ring_buffer::{HistoryRing, Sample};
use serde::Serialize;
use tracing::{debug, warn};

/// Running frame counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Non-empty frames applied
    pub frames_ok: u64,
    /// Polls that returned nothing
    pub empty_frames: u64,
    /// Frames discarded for length or CRC mismatch
    pub integrity_failures: u64,
    /// Frames carrying the overflow marker
    pub overflow_events: u64,
    /// Samples appended to the relay ring
    pub samples_decoded: u64,
}

/// Validates poll responses and appends their samples to the relay ring.
///
/// A frame is applied whole or not at all.
#[derive(Debug, Default)]
pub struct FrameIngest {
    stats: DecodeStats,
}

impl FrameIngest {
    /// Create an ingest stage with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `raw` and append its samples, in order, to `ring`
    pub fn ingest(
        &mut self,
        raw: &[u8],
        ring: &mut HistoryRing<Sample>,
    ) -> Result<DecodedFrame, FrameError> {
        let frame = match decode_response(raw) {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.integrity_failures += 1;
                counter!("relay_integrity_failures_total").increment(1);
                warn!("Discarding frame ({} bytes): {}", raw.len(), err);
                return Err(err);
            }
        };

        if frame.overflow {
            self.stats.overflow_events += 1;
            counter!("relay_overflow_events_total").increment(1);
            warn!("Sampler reported dropped samples before this frame");
        }

        if frame.is_empty() {
            self.stats.empty_frames += 1;
            return Ok(frame);
        }

        ring.extend(frame.samples.iter().copied());
        self.stats.frames_ok += 1;
        self.stats.samples_decoded += frame.count() as u64;
        counter!("relay_frames_decoded_total").increment(1);
        counter!("relay_samples_decoded_total").increment(frame.count() as u64);
        debug!("Applied frame: {} samples from t0={}ms", frame.count(), frame.t0_ms);

        Ok(frame)
    }

    /// Counters so far
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_codec::encode_samples;

    fn samples(range: std::ops::Range<u32>) -> Vec<Sample> {
        range.map(|i| Sample::new(i as u16, i * 5)).collect()
    }

    #[test]
    fn test_ingest_appends_in_order() {
        let mut ingest = FrameIngest::new();
        let mut ring = HistoryRing::new(100);

        ingest.ingest(&encode_samples(&samples(0..3), false), &mut ring).unwrap();
        ingest.ingest(&encode_samples(&samples(3..5), false), &mut ring).unwrap();

        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), samples(0..5));
        assert_eq!(ingest.stats().frames_ok, 2);
        assert_eq!(ingest.stats().samples_decoded, 5);
    }

    #[test]
    fn test_corrupt_frame_not_applied() {
        let mut ingest = FrameIngest::new();
        let mut ring = HistoryRing::new(100);
        let mut frame = encode_samples(&samples(0..4), false);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        assert!(ingest.ingest(&frame, &mut ring).is_err());
        assert!(ring.is_empty());
        assert_eq!(ingest.stats().integrity_failures, 1);

        ingest.ingest(&encode_samples(&samples(4..6), false), &mut ring).unwrap();
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_empty_and_overflow_counted() {
        let mut ingest = FrameIngest::new();
        let mut ring = HistoryRing::new(100);

        assert!(ingest.ingest(&[], &mut ring).unwrap().is_empty());
        assert!(ingest.ingest(&[0], &mut ring).unwrap().is_empty());
        let frame = ingest.ingest(&encode_samples(&samples(0..2), true), &mut ring).unwrap();

        assert!(frame.overflow);
        assert_eq!(ingest.stats().empty_frames, 2);
        assert_eq!(ingest.stats().overflow_events, 1);
        assert_eq!(ring.len(), 2);
    }
}
