//! Health Route

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use stream_protocol::FilterSettings;

use crate::{ApiError, AppState};

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Relay connection status as shown to listeners
    pub relay_status: String,
    /// Samples held by the relay
    pub buffered_samples: usize,
    pub filters: FilterSettings,
}

/// Report relay status; 503 once the relay loop has stopped
pub async fn get_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let reply = state.relay.summary().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        relay_status: reply.status,
        buffered_samples: reply.buffered,
        filters: reply.filters,
    }))
}
