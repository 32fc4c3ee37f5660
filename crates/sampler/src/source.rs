//! Analog Sources

/// Something that yields one raw ADC reading per call
pub trait AnalogSource {
    /// Read the current value
    fn read(&mut self) -> u16;
}

impl<F> AnalogSource for F
where
    F: FnMut() -> u16,
{
    fn read(&mut self) -> u16 {
        self()
    }
}

/// Gaussian bump of the synthetic beat: (phase center, amplitude, width)
const WAVES: [(f64, f64, f64); 5] = [
    (0.20, 80.0, 0.025),   // P
    (0.36, -60.0, 0.008),  // Q
    (0.40, 900.0, 0.010),  // R
    (0.44, -150.0, 0.010), // S
    (0.65, 200.0, 0.050),  // T
];

/// Deterministic ECG-like 12-bit waveform for demos and tests
#[derive(Debug, Clone)]
pub struct SyntheticEcgSource {
    sample_rate_hz: f64,
    heart_rate_bpm: f64,
    baseline: f64,
    index: u64,
}

impl SyntheticEcgSource {
    /// Create a source sampled at `sample_rate_hz` beating at `heart_rate_bpm`
    pub fn new(sample_rate_hz: f64, heart_rate_bpm: f64) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1.0),
            heart_rate_bpm: heart_rate_bpm.max(1.0),
            baseline: 2048.0,
            index: 0,
        }
    }

    fn value_at(&self, index: u64) -> u16 {
        let t = index as f64 / self.sample_rate_hz;
        let period = 60.0 / self.heart_rate_bpm;
        let phase = (t % period) / period;

        let signal: f64 = WAVES
            .iter()
            .map(|&(center, amplitude, width)| {
                let d = (phase - center) / width;
                amplitude * (-0.5 * d * d).exp()
            })
            .sum();

        (self.baseline + signal).clamp(0.0, 4095.0) as u16
    }
}

impl Default for SyntheticEcgSource {
    fn default() -> Self {
        Self::new(200.0, 72.0)
    }
}

impl AnalogSource for SyntheticEcgSource {
    fn read(&mut self) -> u16 {
        let value = self.value_at(self.index);
        self.index += 1;
        value
    }
}
