//! Poll Transports
//!
//! The relay only needs an argument-less call that returns the sampler's
//! frame bytes. Connection handling lives behind this trait.

use crate::error::TransportError;
use async_trait::async_trait;
use frame_codec::FrameEncoder;

/// Call/response transport to one sampler
#[async_trait]
pub trait FrameSource: Send {
    /// Open or reopen the transport after a failure
    async fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Issue one poll call; zero-length means nothing was pending
    async fn request_frame(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Human-readable connection status
    fn describe(&self) -> String;
}

/// In-process transport calling the sampler's encoder directly
pub struct LoopbackSource {
    encoder: FrameEncoder,
}

impl LoopbackSource {
    /// Create a loopback source draining `encoder`
    pub fn new(encoder: FrameEncoder) -> Self {
        Self { encoder }
    }
}

#[async_trait]
impl FrameSource for LoopbackSource {
    async fn request_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self.encoder.poll_response())
    }

    fn describe(&self) -> String {
        "Connected (loopback)".to_string()
    }
}
