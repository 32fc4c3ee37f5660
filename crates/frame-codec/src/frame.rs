//! Frame Encoding and Decoding

use crate::crc::{crc16, crc16_update};
use crate::error::FrameError;
use ring_buffer::Sample;
use tracing::debug;

/// Leading byte signalling that samples were dropped since the previous poll
pub const OVERFLOW_MARKER: u8 = 0x21;

/// Largest sample count a frame can carry
pub const MAX_SAMPLES_PER_FRAME: usize = 255;

/// Saturation limit for the per-sample time delta
pub const MAX_DT_MS: u32 = 255;

const HEADER_LEN: usize = 1 + 4;
const SAMPLE_LEN: usize = 2 + 1;
const CRC_LEN: usize = 2;

/// Total length of a frame with `count` samples, excluding the marker
pub fn frame_len(count: usize) -> usize {
    if count == 0 {
        1
    } else {
        HEADER_LEN + SAMPLE_LEN * count + CRC_LEN
    }
}

/// A validated frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Absolute time of the first sample (0 for an empty frame)
    pub t0_ms: u32,
    /// Samples with absolute timestamps rebuilt from `t0` and the deltas
    pub samples: Vec<Sample>,
    /// The overflow marker was present
    pub overflow: bool,
}

impl DecodedFrame {
    /// Number of samples carried
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Check if the frame carried no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Encode up to [`MAX_SAMPLES_PER_FRAME`] samples, oldest first.
///
/// An empty slice produces the one-byte empty frame and never carries the
/// marker. Inter-sample gaps saturate at [`MAX_DT_MS`].
pub fn encode_samples(samples: &[Sample], overflow: bool) -> Vec<u8> {
    let samples = &samples[..samples.len().min(MAX_SAMPLES_PER_FRAME)];
    let Some(first) = samples.first() else {
        return vec![0];
    };

    let mut out = Vec::with_capacity(1 + frame_len(samples.len()));
    if overflow {
        out.push(OVERFLOW_MARKER);
    }

    let mut crc = 0u16;
    let mut emit = |out: &mut Vec<u8>, bytes: &[u8]| {
        for &byte in bytes {
            crc = crc16_update(crc, byte);
            out.push(byte);
        }
    };

    emit(&mut out, &[samples.len() as u8]);
    emit(&mut out, &first.timestamp_ms.to_le_bytes());

    let mut prev_ts = first.timestamp_ms;
    for sample in samples {
        let dt = sample.timestamp_ms.wrapping_sub(prev_ts).min(MAX_DT_MS) as u8;
        emit(&mut out, &sample.value.to_le_bytes());
        emit(&mut out, &[dt]);
        prev_ts = sample.timestamp_ms;
    }

    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Validate and decode one binary frame.
///
/// A zero-length blob or a lone zero count decodes to an empty frame. Any
/// length or CRC mismatch rejects the frame whole.
pub fn decode_frame(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    let (overflow, body) = split_marker(bytes);
    let Some(&count) = body.first() else {
        return Ok(DecodedFrame {
            overflow,
            ..Default::default()
        });
    };

    if count == 0 {
        if body.len() != 1 {
            return Err(FrameError::LengthMismatch {
                expected: 1,
                actual: body.len(),
            });
        }
        return Ok(DecodedFrame {
            overflow,
            ..Default::default()
        });
    }

    let count = count as usize;
    let expected = frame_len(count);
    if body.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: body.len(),
        });
    }

    let (covered, crc_bytes) = body.split_at(expected - CRC_LEN);
    let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let computed = crc16(covered);
    if received != computed {
        return Err(FrameError::CrcMismatch {
            expected: received,
            actual: computed,
        });
    }

    let t0_ms = u32::from_le_bytes([covered[1], covered[2], covered[3], covered[4]]);
    let mut timestamp = t0_ms;
    let samples = covered[HEADER_LEN..]
        .chunks_exact(SAMPLE_LEN)
        .map(|chunk| {
            timestamp = timestamp.wrapping_add(chunk[2] as u32);
            Sample::new(u16::from_le_bytes([chunk[0], chunk[1]]), timestamp)
        })
        .collect();

    Ok(DecodedFrame {
        t0_ms,
        samples,
        overflow,
    })
}

/// Decode a poll response that is either a binary frame or a legacy
/// hex-encoded one.
///
/// The binary interpretation wins whenever it validates.
pub fn decode_response(raw: &[u8]) -> Result<DecodedFrame, FrameError> {
    match decode_frame(raw) {
        Ok(frame) => Ok(frame),
        Err(err) => {
            let text = raw.trim_ascii();
            if looks_like_hex(text) {
                debug!("Binary decode failed ({}), trying legacy hex response", err);
                decode_frame(&decode_hex(text)?)
            } else {
                Err(err)
            }
        }
    }
}

/// Separate a leading overflow marker from the frame body.
///
/// The marker value is also a legal count (33), so a leading 0x21 is only
/// treated as a marker when the blob is not itself a 33-sample frame.
fn split_marker(bytes: &[u8]) -> (bool, &[u8]) {
    match bytes.first() {
        Some(&OVERFLOW_MARKER)
            if bytes.len() > 1 && bytes.len() != frame_len(OVERFLOW_MARKER as usize) =>
        {
            (true, &bytes[1..])
        }
        _ => (false, bytes),
    }
}

fn looks_like_hex(text: &[u8]) -> bool {
    !text.is_empty() && text.len() % 2 == 0 && text.iter().all(u8::is_ascii_hexdigit)
}

fn decode_hex(text: &[u8]) -> Result<Vec<u8>, FrameError> {
    text.chunks_exact(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair)
                .map_err(|e| FrameError::InvalidHex(e.to_string()))?;
            u8::from_str_radix(digits, 16).map_err(|e| FrameError::InvalidHex(e.to_string()))
        })
        .collect()
}
