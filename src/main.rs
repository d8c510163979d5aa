//! Greenhouse telemetry gateway
//!
//! Ingests sensor frames over TCP, publishes each canonical reading to a
//! durable JetStream stream, evaluates per-owner thresholds, and drives
//! the actuator device over a second persistent connection.

mod config;
mod device;
mod domain;
mod ingest;
mod retry;
mod rules;
mod settings;
mod stream;

use crate::config::GatewayConfig;
use crate::device::CommandDispatcher;
use crate::ingest::{IngestServer, ReadingPipeline};
use crate::settings::HttpSettingsStore;
use crate::stream::StreamPublisher;
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Optional .env for local runs; a missing file is fine
    let _ = dotenvy::dotenv();

    let config = GatewayConfig::from_env();
    info!("gateway starting");
    info!("  sensor listener: {}", config.listen_addr);
    info!("  broker: {} (stream {})", config.broker.url, config.broker.stream);
    info!("  actuator device: {}", config.device.address);
    info!("  settings service: {}", config.settings_api.base_url);

    // Startup-time bootstrap: exhausting the retry budget here is fatal
    let publisher = Arc::new(StreamPublisher::new(config.broker.clone()));
    publisher
        .connect()
        .await
        .context("stream broker bootstrap failed")?;

    // Device connect is best-effort; the dispatcher reconnects on demand
    let dispatcher = Arc::new(CommandDispatcher::new(config.device.clone()));
    if let Err(e) = dispatcher.connect().await {
        warn!("actuator device not reachable yet, will reconnect on demand: {e}");
    }

    let settings = Arc::new(
        HttpSettingsStore::new(&config.settings_api).context("settings client init failed")?,
    );

    let pipeline = Arc::new(ReadingPipeline::new(
        publisher.clone(),
        settings,
        dispatcher.clone(),
    ));
    let server = IngestServer::new(
        config.listen_addr.clone(),
        config.read_timeout,
        config.owner.clone(),
        pipeline,
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    dispatcher.close().await;
    publisher.close().await;
    info!("gateway stopped");
    Ok(())
}
