//! ECG Frame Codec
//!
//! Binary framing between the sampler and the relay. Each poll drains the
//! acquisition ring into one self-contained frame:
//!
//! ```text
//! [0x21]?  optional overflow marker (not covered by the CRC)
//! u8       count (0 => frame ends here)
//! u32 LE   t0_ms, absolute time of the first sample
//! count x  (u16 LE value, u8 dt_ms saturated at 255, 0 for the first sample)
//! u16 LE   CRC-16 over count .. last dt
//! ```

mod crc;
mod encoder;
mod error;
mod frame;

pub use crc::{crc16, crc16_update, CRC16_POLY};
pub use encoder::FrameEncoder;
pub use error::FrameError;
pub use frame::{
    decode_frame, decode_response, encode_samples, frame_len, DecodedFrame, MAX_DT_MS,
    MAX_SAMPLES_PER_FRAME, OVERFLOW_MARKER,
};
