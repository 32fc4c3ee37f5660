//! ECG Relay Server
//!
//! Serves the relay's listener stream over WebSocket along with health and
//! Prometheus metrics endpoints.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use relay::{RelayConfig, RelayHandle};
use sampler::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
pub mod routes;

pub use error::ApiError;

/// Prefix for environment overrides, e.g. `ECG_RELAY__RELAY__POLL_INTERVAL_MS`
pub const ENV_PREFIX: &str = "ECG_RELAY";

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen address for HTTP and WebSocket
    pub bind_addr: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Heart rate of the built-in synthetic source
    pub synthetic_bpm: f64,
    pub sampler: SamplerConfig,
    pub relay: RelayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_json: false,
            synthetic_bpm: 72.0,
            sampler: SamplerConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional config file, then `ECG_RELAY__*` environment
    /// variables. Missing keys keep their defaults.
    pub fn load(path: &str) -> Result<Self, ApiError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse TOML text on its own, without environment overrides
    pub fn from_toml(text: &str) -> Result<Self, ApiError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Handle to the running relay loop
    pub relay: RelayHandle,
    /// Scrape handle, when a recorder is installed
    pub prometheus: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(relay: RelayHandle, prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            relay,
            prometheus,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(routes::stream::stream_socket))
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/metrics", get(routes::metrics::get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging(json: bool) -> Result<(), ApiError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ApiError::Logging(e.to_string()))
}

/// Serve until `shutdown` flips to `true`
pub async fn run_server(
    addr: &str,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ApiError> {
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    info!("API server stopped");
    Ok(())
}
