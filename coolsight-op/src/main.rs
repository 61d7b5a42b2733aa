//! coolsight-op - Cooler Optimization Pipeline Service
//!
//! Drives the appliance-control workflow: photographs of a refrigerated
//! cabinet go in, an inferred inventory is reviewed by the operator, the
//! recommendation engine derives climate-control settings, and the settings
//! are pushed to the cooling unit over its remote control channel.
//!
//! Integrates with UI clients via HTTP REST + SSE.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coolsight_common::events::EventBus;
use coolsight_op::config::{CliOverrides, ServiceConfig};
use coolsight_op::services::{
    CannedClassifier, DeviceApplier, HttpTransmitter, HttpVisionClassifier, InventoryClassifier,
    PipelineController, SettingsTransmitter, SimulatedTransmitter,
};
use coolsight_op::AppState;

/// Latency of the simulated classifier and device channel
const SIMULATED_LATENCY: Duration = Duration::from_millis(1500);

#[derive(Debug, Parser)]
#[command(name = "coolsight-op", about = "CoolSight optimization pipeline service")]
struct Args {
    /// HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote device endpoint URL
    #[arg(long)]
    device_endpoint: Option<String>,

    /// Inference provider endpoint URL
    #[arg(long)]
    classifier_endpoint: Option<String>,

    /// Use the simulated classifier and device channel regardless of
    /// configured endpoints
    #[arg(long, default_value_t = false)]
    simulated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting coolsight-op (Cooler Optimization Pipeline) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let cli = CliOverrides {
        port: args.port,
        device_endpoint: args.device_endpoint,
        classifier_endpoint: args.classifier_endpoint,
        simulated: args.simulated,
    };
    let config = ServiceConfig::resolve(cli, args.config.as_deref())
        .context("Failed to resolve configuration")?;

    // Classification capability: HTTP inference provider, or the canned
    // classifier when no endpoint is configured
    let classifier: Arc<dyn InventoryClassifier> = match (&config.classifier_endpoint, config.simulated) {
        (Some(endpoint), false) => {
            info!(endpoint = %endpoint, "Using HTTP vision classifier");
            Arc::new(
                HttpVisionClassifier::new(endpoint.clone())
                    .context("Failed to build vision classifier")?,
            )
        }
        _ => {
            info!("Using canned classifier (no inference endpoint configured)");
            Arc::new(CannedClassifier::new(SIMULATED_LATENCY))
        }
    };

    // Device control channel: HTTP transmitter, or the simulated channel
    let transmitter: Arc<dyn SettingsTransmitter> = match (&config.device_endpoint, config.simulated) {
        (Some(endpoint), false) => {
            info!(endpoint = %endpoint, "Using HTTP device transmitter");
            Arc::new(
                HttpTransmitter::new(endpoint.clone())
                    .context("Failed to build device transmitter")?,
            )
        }
        _ => {
            info!(
                failure_rate = config.transmit_failure_rate,
                "Using simulated device channel"
            );
            Arc::new(SimulatedTransmitter::new(
                config.transmit_failure_rate,
                SIMULATED_LATENCY,
            ))
        }
    };

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let pipeline = Arc::new(PipelineController::new(
        classifier,
        DeviceApplier::new(transmitter),
        event_bus.clone(),
    ));

    // Create application state
    let state = AppState::new(pipeline, event_bus);

    // Build router
    let app = coolsight_op::build_router(state);

    // Start server
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
