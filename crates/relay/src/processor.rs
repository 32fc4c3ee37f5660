//! Signal Processor Seam
//!
//! Filtering and beat detection are external to the stream core. The relay
//! calls the processor once per publish tick and forwards whatever it
//! reports in the meta message without interpreting it.

use ring_buffer::{HistoryRing, Sample};
use stream_protocol::FilterSettings;

/// Output of one processor invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DspOutput {
    pub status: Option<String>,
    /// Latest beat rate; `None` keeps the previously reported value
    pub bpm: Option<u32>,
    /// Current detection threshold
    pub threshold: Option<f64>,
    /// Polarity of the last detected peak; `None` keeps the previous value
    pub polarity: Option<i8>,
}

/// Opaque function over the relay's sample window
pub trait SignalProcessor: Send {
    /// Process the current window; the last `new_samples` entries arrived
    /// since the previous call
    fn process(&mut self, window: &HistoryRing<Sample>, new_samples: usize) -> DspOutput;

    /// Filter toggles changed
    fn set_filters(&mut self, _filters: &FilterSettings) {}

    /// The relay buffer was cleared
    fn reset(&mut self) {}
}

/// Processor that reports nothing, leaving the raw signal untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

impl SignalProcessor for PassthroughProcessor {
    fn process(&mut self, _window: &HistoryRing<Sample>, _new_samples: usize) -> DspOutput {
        DspOutput::default()
    }
}
