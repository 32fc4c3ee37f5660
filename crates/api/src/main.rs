//! ECG Relay - Main Entry Point

use anyhow::Context;
use api::{init_logging, routes, run_server, AppConfig, AppState};
use relay::{LoopbackSource, PassthroughProcessor, Relay};
use sampler::{Sampler, SyntheticEcgSource};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "ecg-relay".to_string());
    let config = AppConfig::load(&config_path).context("loading configuration")?;
    init_logging(config.log_json)?;

    info!("=== ECG Relay v{} ===", env!("CARGO_PKG_VERSION"));

    let prometheus = routes::metrics::install_recorder()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Sampler tier, fed by the synthetic source
    let sampler = Arc::new(Sampler::new(config.sampler.clone()));
    let source = SyntheticEcgSource::new(config.sampler.sample_rate_hz, config.synthetic_bpm);
    let sampler_task = {
        let sampler = Arc::clone(&sampler);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { sampler.run(source, shutdown).await })
    };

    // Relay tier, polling the sampler in-process
    let (relay, handle) = Relay::new(
        config.relay.clone(),
        LoopbackSource::new(sampler.encoder()),
        PassthroughProcessor,
    );
    let relay_task = tokio::spawn(relay.run(shutdown_rx.clone()));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let state = Arc::new(AppState::new(handle, Some(prometheus)));
    run_server(&config.bind_addr, state, shutdown_rx).await?;

    sampler_task.await?;
    relay_task.await?;
    info!("Shutdown complete");
    Ok(())
}
