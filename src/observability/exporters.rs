//! OTLP exporter trio.
//!
//! Each signal gets its own exporter, all speaking OTLP/gRPC over the same
//! [`CollectorChannel`]. Construction failures are reported per signal so the
//! startup error names the exporter that failed.

use opentelemetry_otlp::{
    LogExporter, MetricExporter, SpanExporter, WithExportConfig, WithTonicConfig,
};

use crate::config::TelemetryConfig;
use crate::lifecycle::startup::InitError;
use crate::observability::channel::CollectorChannel;
use crate::observability::Signal;

/// One exporter per signal type.
#[derive(Debug)]
pub struct ExporterTrio<S, M, L> {
    pub spans: S,
    pub metrics: M,
    pub logs: L,
}

/// The production trio.
pub type OtlpExporters = ExporterTrio<SpanExporter, MetricExporter, LogExporter>;

/// Build the trace, metric and log exporters in that order.
pub fn otlp_exporters(
    channel: &CollectorChannel,
    config: &TelemetryConfig,
) -> Result<OtlpExporters, InitError> {
    let spans = SpanExporter::builder()
        .with_tonic()
        .with_channel(channel.handle()?)
        .with_timeout(config.export_timeout())
        .build()
        .map_err(|e| InitError::exporter(Signal::Traces, e))?;
    tracing::debug!(signal = %Signal::Traces, target = channel.target(), "Exporter ready");

    let metrics = MetricExporter::builder()
        .with_tonic()
        .with_channel(channel.handle()?)
        .with_timeout(config.export_timeout())
        .build()
        .map_err(|e| InitError::exporter(Signal::Metrics, e))?;
    tracing::debug!(signal = %Signal::Metrics, target = channel.target(), "Exporter ready");

    let logs = LogExporter::builder()
        .with_tonic()
        .with_channel(channel.handle()?)
        .with_timeout(config.export_timeout())
        .build()
        .map_err(|e| InitError::exporter(Signal::Logs, e))?;
    tracing::debug!(signal = %Signal::Logs, target = channel.target(), "Exporter ready");

    Ok(ExporterTrio {
        spans,
        metrics,
        logs,
    })
}
