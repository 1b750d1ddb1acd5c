//! Traced HTTP service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ /hello ─────────────────────────────┐
//!     Client ──▶ /work ──(traceparent)──▶ /downstream │
//!                  │                          │       │
//!                  ▼                          ▼       ▼
//!          ┌───────────────────────────────────────────────┐
//!          │ Telemetry registry (tracer, meter, loggers)  │
//!          └──────────────┬────────────────────────────────┘
//!                         ▼
//!          ┌───────────────────────────────────────────────┐
//!          │ Pipelines: batch spans │ periodic metrics │   │
//!          │            batch logs  (shared resource)      │
//!          └──────────────┬────────────────────────────────┘
//!                         ▼
//!               one OTLP/gRPC channel ──▶ collector
//! ```
//!
//! Shutdown order: stop accepting, drain, traces, metrics, logs, channel.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use traced_service::config::load_config;
use traced_service::lifecycle::{signals, Coordinator};
use traced_service::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "traced-service")]
#[command(about = "HTTP service instrumented with OpenTelemetry", long_about = None)]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        service_name = %config.telemetry.service_name,
        otlp_endpoint = %config.telemetry.otlp_endpoint,
        bind_address = %config.server.bind_address,
        "traced-service starting"
    );

    let coordinator = Coordinator::new(config);
    let pipelines = coordinator.initialize().await?;

    let listener = match TcpListener::bind(&coordinator.config().server.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind listener");
            let report = pipelines
                .shutdown(coordinator.config().telemetry.shutdown_timeout())
                .await;
            if !report.is_clean() {
                tracing::warn!(failures = report.failures.len(), "Telemetry shutdown incomplete");
            }
            return Err(e.into());
        }
    };

    let service = coordinator.launch(listener, pipelines)?;
    service.run_until(signals::termination()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
