//! HTTP and WebSocket routes

pub mod health;
pub mod metrics;
pub mod stream;
