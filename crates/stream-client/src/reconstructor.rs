//! Client Reconstructor

use ring_buffer::HistoryRing;
use serde::{Deserialize, Serialize};
use stream_protocol::{DeltaPayload, MetaPayload, RelayMessage, SnapshotPayload};
use tracing::debug;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Display buffer capacity (10s at 200Hz)
    pub capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { capacity: 2000 }
    }
}

/// One point of the display timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPoint {
    /// Offset from the anchor timestamp
    pub relative_ms: i64,
    pub value: u16,
}

/// Applies relay messages to a bounded display buffer
#[derive(Debug, Clone)]
pub struct ClientReconstructor {
    ring: HistoryRing<ClientPoint>,
    /// Sampler time that maps to `relative_ms == 0`
    anchor_ms: Option<u32>,
    threshold: Option<f64>,
    meta: Option<MetaPayload>,
}

impl ClientReconstructor {
    /// Create an empty client
    pub fn new(config: ClientConfig) -> Self {
        Self {
            ring: HistoryRing::new(config.capacity),
            anchor_ms: None,
            threshold: None,
            meta: None,
        }
    }

    /// Dispatch any relay message
    pub fn handle(&mut self, message: &RelayMessage) {
        match message {
            RelayMessage::Snapshot(snapshot) => {
                self.apply_snapshot(snapshot);
            }
            RelayMessage::Delta(delta) => {
                self.apply_delta(delta);
            }
            RelayMessage::Meta(meta) => self.meta = Some(meta.clone()),
        }
    }

    /// Seed an empty buffer from a snapshot.
    ///
    /// A snapshot arriving after the buffer already holds data is ignored,
    /// so a late full-state message cannot clobber newer points. Returns
    /// whether it was applied.
    pub fn apply_snapshot(&mut self, snapshot: &SnapshotPayload) -> bool {
        if !self.ring.is_empty() {
            debug!("Ignoring snapshot: buffer already holds {} points", self.ring.len());
            return false;
        }
        if snapshot.is_empty() {
            return false;
        }

        self.anchor_ms = Some(snapshot.t0_ms);
        self.threshold = snapshot.threshold;
        let points = snapshot
            .samples
            .t_rel_ms
            .iter()
            .zip(&snapshot.samples.value)
            .map(|(&t_rel, &value)| ClientPoint {
                relative_ms: signed_offset(t_rel),
                value,
            });
        self.ring.extend(points);
        true
    }

    /// Append a delta batch, returning the number of points pushed.
    ///
    /// The first message after a clear becomes the anchor if no snapshot
    /// provided one.
    pub fn apply_delta(&mut self, delta: &DeltaPayload) -> usize {
        if delta.is_empty() {
            return 0;
        }

        let anchor = *self.anchor_ms.get_or_insert(delta.t0_ms);
        self.threshold = delta.threshold;

        // Sampler time wraps at u32::MAX, so offsets are taken modulo 2^32.
        let mut absolute = delta.t0_ms;
        for (&value, &dt) in delta.value.iter().zip(&delta.dt_ms) {
            absolute = absolute.wrapping_add(dt as u32);
            self.ring.push(ClientPoint {
                relative_ms: signed_offset(absolute.wrapping_sub(anchor)),
                value,
            });
        }
        delta.len()
    }

    /// Empty the buffer and forget the anchor
    pub fn clear(&mut self) {
        self.ring.clear();
        self.anchor_ms = None;
        self.threshold = None;
    }

    /// Transport dropped; the next connection starts from scratch
    pub fn on_disconnect(&mut self) {
        self.clear();
        self.meta = None;
    }

    /// The last `min(capacity, points seen)` points, oldest to newest
    pub fn view(&self) -> impl Iterator<Item = ClientPoint> + '_ {
        self.ring.iter().copied()
    }

    /// Anchor timestamp, once known
    pub fn anchor_ms(&self) -> Option<u32> {
        self.anchor_ms
    }

    /// Most recent detection threshold
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Most recent meta message
    pub fn meta(&self) -> Option<&MetaPayload> {
        self.meta.as_ref()
    }

    /// Points currently held
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if no points are held
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Interpret a wrapped `u32` difference as a signed offset
fn signed_offset(diff: u32) -> i64 {
    diff as i32 as i64
}

impl Default for ClientReconstructor {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
