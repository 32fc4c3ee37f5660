//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay::RelayError;
use serde_json::json;
use thiserror::Error;

/// Errors raised while starting or serving the API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("metrics exporter setup failed: {0}")]
    Metrics(String),

    #[error("relay unavailable: {0}")]
    Relay(#[from] RelayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Relay(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
