//! Lock-Free Acquisition Ring Implementation

use crate::Sample;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Default acquisition capacity (200 samples = ~1s at 200Hz)
pub const DEFAULT_CAPACITY: usize = 200;

/// Samples taken off the ring by one [`AcquisitionRing::drain`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    /// Unread samples, oldest first
    pub samples: Vec<Sample>,
    /// At least one sample was dropped since the previous successful drain
    pub overflow: bool,
}

/// Fixed-capacity SPSC ring for acquired samples.
///
/// The acquisition path is the only writer; the poll handler is the only
/// reader. Neither side ever waits for the other: `push` drops the oldest
/// unread sample when the window is full, and `drain` claims its range with
/// a single compare-and-swap on `tail`, retrying if the writer dropped a
/// sample in the meantime.
///
/// `head` and `tail` are monotonically increasing positions; the slot for a
/// position is `pos % capacity`, so all `capacity` slots hold unread data.
pub struct AcquisitionRing {
    /// Pre-allocated slots, each a packed [`Sample`]
    slots: Box<[AtomicU64]>,
    /// Capacity of the ring
    capacity: usize,
    /// Next write position
    head: AtomicUsize,
    /// Next unread position
    tail: AtomicUsize,
    /// Set when an unread sample was overwritten
    overflow: AtomicBool,
    /// Total samples written (for statistics)
    total_written: AtomicUsize,
}

impl AcquisitionRing {
    /// Create a new ring with given capacity (at least one slot)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots: Vec<AtomicU64> = (0..capacity).map(|_| AtomicU64::new(0)).collect();
        Self {
            slots: slots.into_boxed_slice(),
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
            total_written: AtomicUsize::new(0),
        }
    }

    /// Create a ring with default capacity (200 samples)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Push a sample, overwriting the oldest unread one if the ring is full.
    ///
    /// Returns `true` when a sample was dropped. Must only be called from
    /// the single producer.
    pub fn push(&self, value: u16, timestamp_ms: u32) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let mut dropped = false;

        // Make room before touching the slot: the slot at `head` aliases
        // `tail` exactly when the window is full.
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            if head.wrapping_sub(tail) < self.capacity {
                break;
            }
            if self
                .tail
                .compare_exchange(tail, tail + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                dropped = true;
                break;
            }
        }

        if dropped {
            self.overflow.store(true, Ordering::Release);
        }

        self.slots[head % self.capacity]
            .store(Sample::new(value, timestamp_ms).pack(), Ordering::Release);
        self.head.store(head + 1, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);

        dropped
    }

    /// Take up to `max` unread samples, oldest first, and advance `tail` by
    /// exactly the number returned.
    ///
    /// The overflow flag is read-and-cleared only when at least one sample
    /// is taken; an empty drain leaves it untouched.
    pub fn drain(&self, max: usize) -> Drained {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);
            let count = head.wrapping_sub(tail).min(max);
            if count == 0 {
                return Drained::default();
            }

            let samples: Vec<Sample> = (0..count)
                .map(|i| Sample::unpack(self.slots[(tail + i) % self.capacity].load(Ordering::Acquire)))
                .collect();

            if self
                .tail
                .compare_exchange(tail, tail + count, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let overflow = self.overflow.swap(false, Ordering::AcqRel);
                return Drained { samples, overflow };
            }
        }
    }

    /// Number of unread samples
    pub fn unread(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.capacity)
    }

    /// Check if there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.unread() == 0
    }

    /// Check if the next push will drop a sample
    pub fn is_full(&self) -> bool {
        self.unread() == self.capacity
    }

    /// Get the ring capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a drop is waiting to be reported
    pub fn overflow_pending(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    /// Get total samples written (for statistics)
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Discard all unread samples and the pending overflow flag
    pub fn clear(&self) {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);
            if self
                .tail
                .compare_exchange(tail, head, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
        self.overflow.store(false, Ordering::Release);
    }
}

impl Default for AcquisitionRing {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_push_and_drain() {
        let ring = AcquisitionRing::new(10);

        for i in 0..5u16 {
            ring.push(i * 100, i as u32 * 5);
        }

        assert_eq!(ring.unread(), 5);

        let drained = ring.drain(3);
        assert_eq!(drained.samples.len(), 3);
        assert_eq!(drained.samples[0], Sample::new(0, 0)); // Oldest first
        assert_eq!(drained.samples[2], Sample::new(200, 10));
        assert!(!drained.overflow);
        assert_eq!(ring.unread(), 2);
    }

    #[test]
    fn test_overwrite_oldest_sets_overflow() {
        let ring = AcquisitionRing::new(5);

        for i in 0..8u16 {
            ring.push(i, i as u32);
        }

        assert_eq!(ring.unread(), 5);
        assert!(ring.overflow_pending());

        let drained = ring.drain(255);
        let values: Vec<u16> = drained.samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3, 4, 5, 6, 7]);
        assert!(drained.overflow);
        assert!(!ring.overflow_pending());
    }

    #[test]
    fn test_empty_drain_keeps_overflow() {
        let ring = AcquisitionRing::new(2);
        ring.push(1, 0);
        ring.push(2, 1);
        ring.push(3, 2);
        assert!(ring.overflow_pending());

        ring.clear();
        assert!(!ring.overflow_pending());

        ring.push(4, 3);
        ring.push(5, 4);
        ring.push(6, 5);
        ring.drain(0);
        assert!(ring.overflow_pending());
    }

    #[test]
    fn test_drain_clamps_and_defers_remainder() {
        let ring = AcquisitionRing::new(400);
        for i in 0..300u16 {
            ring.push(i, i as u32);
        }

        let first = ring.drain(255);
        assert_eq!(first.samples.len(), 255);
        assert_eq!(ring.unread(), 45);

        let second = ring.drain(255);
        assert_eq!(second.samples.len(), 45);
        assert_eq!(second.samples[0].value, 255);
    }

    #[test]
    fn test_concurrent_producer_never_blocks() {
        let ring = Arc::new(AcquisitionRing::new(64));
        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for i in 0..10_000u32 {
                    ring.push(i as u16, i);
                }
            })
        };

        let mut last_ts: Option<u32> = None;
        let mut received = 0usize;
        while !producer.is_finished() || !ring.is_empty() {
            for sample in ring.drain(255).samples {
                if let Some(prev) = last_ts {
                    assert!(sample.timestamp_ms > prev, "samples must stay ordered");
                }
                assert_eq!(sample.value, sample.timestamp_ms as u16);
                last_ts = Some(sample.timestamp_ms);
                received += 1;
            }
        }
        producer.join().unwrap();

        assert!(received <= 10_000);
        assert_eq!(last_ts, Some(9_999));
        assert_eq!(ring.total_written(), 10_000);
    }

    proptest! {
        #[test]
        fn prop_drain_takes_min_of_max_and_unread(pushes in 0usize..600, cap in 1usize..300, max in 0usize..300) {
            let ring = AcquisitionRing::new(cap);
            for i in 0..pushes {
                ring.push(i as u16, i as u32);
            }
            let before = ring.unread();
            prop_assert_eq!(before, pushes.min(cap));

            let drained = ring.drain(max);
            prop_assert_eq!(drained.samples.len(), before.min(max));
            prop_assert_eq!(ring.unread(), before - drained.samples.len());
        }
    }
}
