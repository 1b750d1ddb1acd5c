//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the resource, channel, exporters and providers in dependency order
//! - Name the stage that failed when startup aborts
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when the pipelines exist)

use std::error::Error as StdError;

use thiserror::Error;

use crate::config::{validation::validate_config, AppConfig, ConfigError};
use crate::observability::{
    build_resource, otlp_exporters, CollectorChannel, PipelineSettings, Signal, TelemetryPipelines,
};

/// A startup failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid collector endpoint '{endpoint}'")]
    Endpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("collector at '{endpoint}' unreachable after {attempts} attempt(s)")]
    Channel {
        endpoint: String,
        attempts: u32,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("collector channel is closed")]
    ChannelClosed,

    #[error("failed to create {signal} exporter")]
    Exporter {
        signal: Signal,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("failed to build downstream HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid lifecycle transition: service is {0}")]
    State(crate::lifecycle::LifecycleState),
}

impl InitError {
    pub(crate) fn exporter<E>(signal: Signal, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        InitError::Exporter {
            signal,
            source: Box::new(source),
        }
    }

    /// Short name of the failed stage, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            InitError::Config(_) => "config",
            InitError::Endpoint { .. } | InitError::Channel { .. } | InitError::ChannelClosed => {
                "channel"
            }
            InitError::Exporter {
                signal: Signal::Traces,
                ..
            } => "trace-exporter",
            InitError::Exporter {
                signal: Signal::Metrics,
                ..
            } => "metric-exporter",
            InitError::Exporter {
                signal: Signal::Logs,
                ..
            } => "log-exporter",
            InitError::HttpClient(_) => "http-client",
            InitError::State(_) => "lifecycle",
        }
    }
}

/// Build the OTLP pipelines: resource → channel → exporters → providers.
pub async fn build_otlp_pipelines(config: &AppConfig) -> Result<TelemetryPipelines, InitError> {
    validate_config(config).map_err(ConfigError::Validation)?;
    let telemetry = &config.telemetry;

    let resource = build_resource(telemetry);
    tracing::info!(service_name = %telemetry.service_name, "Resource built");

    let channel = CollectorChannel::connect(telemetry).await?;
    let exporters = otlp_exporters(&channel, telemetry)?;

    let pipelines =
        TelemetryPipelines::build(resource, exporters, &PipelineSettings::from(telemetry))
            .with_channel(channel);
    Ok(pipelines)
}
