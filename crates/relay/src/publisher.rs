//! Snapshot and Delta Publishing

use ring_buffer::{HistoryRing, Sample};
use stream_protocol::{DeltaPayload, SnapshotPayload, SnapshotSamples, MAX_DELTA_DT_MS};

/// Tracks which relay samples listeners have not been sent yet.
///
/// Samples become pending when ingested and are handed out as one delta per
/// publish tick. A snapshot covers everything already published, so a
/// listener that takes a snapshot and then follows the deltas sees every
/// sample exactly once.
#[derive(Debug, Default)]
pub struct DeltaPublisher {
    pending: usize,
}

impl DeltaPublisher {
    /// Create a publisher with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` samples appended to the relay ring
    pub fn note_appended(&mut self, count: usize) {
        self.pending += count;
    }

    /// Samples waiting for the next delta
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Forget pending samples
    pub fn reset(&mut self) {
        self.pending = 0;
    }

    /// Full-state payload for a listener with an empty display.
    ///
    /// Returns `None` when nothing has been published yet.
    pub fn snapshot(&self, ring: &HistoryRing<Sample>, threshold: Option<f64>) -> Option<SnapshotPayload> {
        let published = ring.len().saturating_sub(self.pending);
        let mut samples = ring.iter().take(published).peekable();
        let t0_ms = samples.peek()?.timestamp_ms;

        let (t_rel_ms, value) = samples
            .map(|s| (s.timestamp_ms.wrapping_sub(t0_ms), s.value))
            .unzip();

        Some(SnapshotPayload {
            t0_ms,
            samples: SnapshotSamples { t_rel_ms, value },
            threshold,
        })
    }

    /// Delta covering every pending sample still held by `ring`.
    ///
    /// Clears the pending count. Returns `None` when nothing is pending.
    pub fn take_delta(&mut self, ring: &HistoryRing<Sample>, threshold: Option<f64>) -> Option<DeltaPayload> {
        let count = std::mem::take(&mut self.pending).min(ring.len());
        let mut samples = ring.last(count).peekable();
        let t0_ms = samples.peek()?.timestamp_ms;

        let mut prev_ms = t0_ms;
        let (value, dt_ms) = samples
            .map(|s| {
                let dt = s.timestamp_ms.wrapping_sub(prev_ms).min(MAX_DELTA_DT_MS) as u8;
                prev_ms = s.timestamp_ms;
                (s.value, dt)
            })
            .unzip();

        Some(DeltaPayload {
            t0_ms,
            value,
            dt_ms,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ring_with(samples: &[(u16, u32)]) -> HistoryRing<Sample> {
        let mut ring = HistoryRing::new(100);
        ring.extend(samples.iter().map(|&(v, t)| Sample::new(v, t)));
        ring
    }

    #[test]
    fn test_delta_covers_only_new_samples() {
        let mut ring = ring_with(&[(1, 100), (2, 105)]);
        let mut publisher = DeltaPublisher::new();
        publisher.note_appended(2);
        publisher.take_delta(&ring, None).unwrap();

        ring.extend([Sample::new(3, 110), Sample::new(4, 118), Sample::new(5, 500)]);
        publisher.note_appended(3);

        let delta = publisher.take_delta(&ring, Some(2.5)).unwrap();
        assert_eq!(delta.t0_ms, 110);
        assert_eq!(delta.value, vec![3, 4, 5]);
        assert_eq!(delta.dt_ms, vec![0, 8, 255]);
        assert_eq!(delta.threshold, Some(2.5));
        assert_eq!(publisher.pending(), 0);
    }

    #[test]
    fn test_no_delta_without_new_samples() {
        let ring = ring_with(&[(1, 100)]);
        let mut publisher = DeltaPublisher::new();
        assert!(publisher.take_delta(&ring, None).is_none());
    }

    #[test]
    fn test_pending_beyond_ring_is_clamped() {
        let mut ring = HistoryRing::new(3);
        ring.extend((0..10u32).map(|i| Sample::new(i as u16, i)));
        let mut publisher = DeltaPublisher::new();
        publisher.note_appended(10);

        let delta = publisher.take_delta(&ring, None).unwrap();
        assert_eq!(delta.value, vec![7, 8, 9]);
        assert_eq!(delta.t0_ms, 7);
    }

    #[test]
    fn test_snapshot_excludes_pending() {
        let ring = ring_with(&[(1, 1000), (2, 1005), (3, 1012), (4, 1020)]);
        let mut publisher = DeltaPublisher::new();
        publisher.note_appended(1);

        let snapshot = publisher.snapshot(&ring, None).unwrap();
        assert_eq!(snapshot.t0_ms, 1000);
        assert_eq!(snapshot.samples.t_rel_ms, vec![0, 5, 12]);
        assert_eq!(snapshot.samples.value, vec![1, 2, 3]);

        let delta = publisher.take_delta(&ring, None).unwrap();
        assert_eq!(delta.value, vec![4]);
        assert_eq!(delta.t0_ms, 1020);
    }

    #[test]
    fn test_snapshot_of_empty_ring() {
        let publisher = DeltaPublisher::new();
        assert!(publisher.snapshot(&HistoryRing::new(4), None).is_none());
    }

    proptest! {
        #[test]
        fn prop_snapshot_then_deltas_see_each_sample_once(
            batches in proptest::collection::vec((1usize..20, any::<bool>()), 1..30),
            join_at in 0usize..30,
        ) {
            let mut ring = HistoryRing::new(1000);
            let mut publisher = DeltaPublisher::new();
            let mut listener: Option<Vec<u16>> = None;
            let mut next = 0u16;

            for (i, &(len, publish)) in batches.iter().enumerate() {
                if i == join_at {
                    let seen = publisher
                        .snapshot(&ring, None)
                        .map(|s| s.samples.value)
                        .unwrap_or_default();
                    listener = Some(seen);
                }
                ring.extend((0..len).map(|_| {
                    next += 1;
                    Sample::new(next, next as u32 * 5)
                }));
                publisher.note_appended(len);
                if publish {
                    if let Some(delta) = publisher.take_delta(&ring, None) {
                        if let Some(seen) = listener.as_mut() {
                            seen.extend(delta.value);
                        }
                    }
                }
            }
            if let Some(delta) = publisher.take_delta(&ring, None) {
                if let Some(seen) = listener.as_mut() {
                    seen.extend(delta.value);
                }
            }

            if let Some(seen) = listener {
                prop_assert_eq!(seen, (1..=next).collect::<Vec<u16>>());
            }
        }
    }
}
