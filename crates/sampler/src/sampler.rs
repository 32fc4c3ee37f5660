//! Acquisition Tick and Service Loop

use crate::source::AnalogSource;
use frame_codec::FrameEncoder;
use ring_buffer::AcquisitionRing;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Configuration for the sampler tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Acquisition rate in Hz (default: 200.0)
    pub sample_rate_hz: f64,
    /// Acquisition ring capacity in samples (default: 200, ~1s)
    pub ring_capacity: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 200.0,
            ring_capacity: ring_buffer::DEFAULT_CAPACITY,
        }
    }
}

impl SamplerConfig {
    /// Interval between acquisition ticks
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.sample_rate_hz.max(1.0))
    }
}

/// Interrupt-safe handle that marks one sample as due
#[derive(Debug, Clone)]
pub struct AcquisitionTicker {
    pending: Arc<AtomicU32>,
}

impl AcquisitionTicker {
    /// Record one due sample; never blocks
    pub fn tick(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Samples marked due and not yet serviced
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Relaxed)
    }
}

/// One acquisition channel: ring, pending counter and sampler clock
pub struct Sampler {
    config: SamplerConfig,
    ring: Arc<AcquisitionRing>,
    pending: Arc<AtomicU32>,
    epoch: Instant,
}

impl Sampler {
    /// Create a sampler with its own acquisition ring
    pub fn new(config: SamplerConfig) -> Self {
        info!(
            "Creating sampler: {} Hz, ring capacity {}",
            config.sample_rate_hz, config.ring_capacity
        );
        Self {
            ring: Arc::new(AcquisitionRing::new(config.ring_capacity)),
            pending: Arc::new(AtomicU32::new(0)),
            epoch: Instant::now(),
            config,
        }
    }

    /// Handle for the periodic tick context
    pub fn ticker(&self) -> AcquisitionTicker {
        AcquisitionTicker {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Encoder for the poll handler, sharing this sampler's ring
    pub fn encoder(&self) -> FrameEncoder {
        FrameEncoder::new(Arc::clone(&self.ring))
    }

    /// The acquisition ring
    pub fn ring(&self) -> &Arc<AcquisitionRing> {
        &self.ring
    }

    /// Milliseconds since the sampler started, wrapping at `u32::MAX`
    pub fn millis(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    /// Perform the reads for every due tick and push them, stamped `now_ms`.
    ///
    /// Returns the number of samples pushed.
    pub fn service<S: AnalogSource>(&self, source: &mut S, now_ms: u32) -> u32 {
        let due = self.pending.swap(0, Ordering::AcqRel);
        let mut dropped = 0u32;
        for _ in 0..due {
            if self.ring.push(source.read(), now_ms) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Acquisition ring full, {} oldest samples dropped", dropped);
        }
        due
    }

    /// Run the acquisition loop until `shutdown` flips to `true`.
    ///
    /// Each interval tick marks a sample due, then the loop services it
    /// outside the tick path.
    pub async fn run<S: AnalogSource>(&self, mut source: S, mut shutdown: watch::Receiver<bool>) {
        info!("Starting acquisition loop");
        let ticker = self.ticker();
        let mut interval = tokio::time::interval(self.config.sample_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    ticker.tick();
                    self.service(&mut source, self.millis());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Acquisition loop stopped");
    }
}
