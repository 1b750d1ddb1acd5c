//! Trace, metric and log providers.
//!
//! # Responsibilities
//! - Compose each exporter with its batching or aggregation strategy
//! - Attach the shared resource to all three providers
//! - Create emitters (tracer, meter, logger) for named subsystems
//! - Flush and shut down in a fixed order, channel last
//!
//! # Design Decisions
//! - Generic over the exporter trio; OTLP in production, in-memory in tests
//! - Sampler is `AlwaysOn`
//! - Shutdown is best-effort: a failing stage never skips the next one

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry::logs::LoggerProvider as _;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::logs::{
    BatchConfigBuilder as LogBatchConfigBuilder, BatchLogProcessor, LogExporter, SdkLogger,
    SdkLoggerProvider,
};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder as SpanBatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracer,
    SdkTracerProvider, SpanExporter,
};
use opentelemetry_sdk::Resource;
use tokio::task::JoinError;
use tokio::time::Instant;

use crate::config::{BatchConfig, TelemetryConfig};
use crate::lifecycle::shutdown::{ShutdownError, ShutdownReport, ShutdownStage};
use crate::observability::channel::CollectorChannel;
use crate::observability::exporters::ExporterTrio;

/// Batching and aggregation settings for [`TelemetryPipelines::build`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch: BatchConfig,
    pub metric_interval: Duration,
}

impl From<&TelemetryConfig> for PipelineSettings {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            batch: config.batch.clone(),
            metric_interval: config.metric_interval(),
        }
    }
}

/// The three providers plus the channel their exporters share.
///
/// Only the lifecycle coordinator holds this value; request code sees the
/// emitters derived from it through [`crate::observability::Telemetry`].
#[derive(Debug)]
pub struct TelemetryPipelines {
    resource: Resource,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: SdkLoggerProvider,
    channel: Option<CollectorChannel>,
    shut_down: AtomicBool,
}

impl TelemetryPipelines {
    /// Build all three providers around `exporters`.
    pub fn build<S, M, L>(
        resource: Resource,
        exporters: ExporterTrio<S, M, L>,
        settings: &PipelineSettings,
    ) -> Self
    where
        S: SpanExporter + 'static,
        M: PushMetricExporter,
        L: LogExporter + 'static,
    {
        let batch = &settings.batch;

        let span_processor = BatchSpanProcessor::builder(exporters.spans)
            .with_batch_config(
                SpanBatchConfigBuilder::default()
                    .with_max_queue_size(batch.max_queue_size)
                    .with_max_export_batch_size(batch.max_export_batch_size)
                    .with_scheduled_delay(batch.scheduled_delay())
                    .build(),
            )
            .build();
        let tracer_provider = SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone())
            .with_span_processor(span_processor)
            .build();

        let reader = PeriodicReader::builder(exporters.metrics)
            .with_interval(settings.metric_interval)
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader)
            .build();

        let log_processor = BatchLogProcessor::builder(exporters.logs)
            .with_batch_config(
                LogBatchConfigBuilder::default()
                    .with_max_queue_size(batch.max_queue_size)
                    .with_max_export_batch_size(batch.max_export_batch_size)
                    .with_scheduled_delay(batch.scheduled_delay())
                    .build(),
            )
            .build();
        let logger_provider = SdkLoggerProvider::builder()
            .with_resource(resource.clone())
            .with_log_processor(log_processor)
            .build();

        tracing::info!(
            max_export_batch_size = batch.max_export_batch_size,
            scheduled_delay = ?batch.scheduled_delay(),
            metric_interval = ?settings.metric_interval,
            "Telemetry pipelines built"
        );

        Self {
            resource,
            tracer_provider,
            meter_provider,
            logger_provider,
            channel: None,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Attach the channel the exporters were built on; it is closed after the providers.
    pub fn with_channel(mut self, channel: CollectorChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn tracer(&self, name: &'static str) -> SdkTracer {
        self.tracer_provider.tracer(name)
    }

    pub fn meter(&self, name: &'static str) -> Meter {
        self.meter_provider.meter(name)
    }

    pub fn logger(&self, name: &'static str) -> SdkLogger {
        self.logger_provider.logger(name)
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn channel(&self) -> Option<&CollectorChannel> {
        self.channel.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Export everything buffered so far. Every provider is flushed; the first failure is returned.
    pub fn force_flush(&self) -> Result<(), OTelSdkError> {
        let results = [
            self.tracer_provider.force_flush(),
            self.meter_provider.force_flush(),
            self.logger_provider.force_flush(),
        ];
        results.into_iter().collect()
    }

    /// Shut down traces, metrics, logs, then the channel.
    ///
    /// Each provider stage may use what is left of `timeout`, and never less
    /// than an equal share of it. A stage that overruns does not hold up the
    /// next one; it is awaited again before the channel is touched. The
    /// channel stays open while any stage is still running. The whole call
    /// never takes more than three times `timeout`. Calling this twice yields a report with
    /// [`ShutdownError::AlreadyShutDown`] and touches nothing.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            let mut report = ShutdownReport::default();
            report.failures.push(ShutdownError::AlreadyShutDown);
            return report;
        }

        let tracer_provider = self.tracer_provider.clone();
        let meter_provider = self.meter_provider.clone();
        let logger_provider = self.logger_provider.clone();
        let stages: Vec<(ShutdownStage, StageFn)> = vec![
            (
                ShutdownStage::Traces,
                Box::new(move || tracer_provider.shutdown()),
            ),
            (
                ShutdownStage::Metrics,
                Box::new(move || meter_provider.shutdown()),
            ),
            (
                ShutdownStage::Logs,
                Box::new(move || logger_provider.shutdown()),
            ),
        ];

        let (mut report, still_running) = shutdown_providers(stages, timeout).await;

        if let Some(channel) = &self.channel {
            report.record(ShutdownStage::Channel, close_after(channel, still_running));
        }

        report
    }
}

type StageFn = Box<dyn FnOnce() -> Result<(), OTelSdkError> + Send + 'static>;

/// Run each provider shutdown on the blocking pool, in order.
///
/// Returns the report plus the stages whose shutdown was still running when
/// their budget and grace period both ran out.
async fn shutdown_providers(
    stages: Vec<(ShutdownStage, StageFn)>,
    timeout: Duration,
) -> (ShutdownReport, Vec<ShutdownStage>) {
    let share = timeout / stages.len().max(1) as u32;
    let deadline = Instant::now() + timeout;
    let mut report = ShutdownReport::default();
    let mut overrun = Vec::new();

    for (stage, shutdown) in stages {
        let budget = deadline.saturating_duration_since(Instant::now()).max(share);
        let mut task = tokio::task::spawn_blocking(shutdown);

        match tokio::time::timeout(budget, &mut task).await {
            Ok(joined) => report.record(stage, stage_result(stage, joined)),
            Err(_) => {
                tracing::warn!(
                    stage = %stage,
                    budget = ?budget,
                    "Shutdown stage overran its budget"
                );
                overrun.push((stage, task, budget));
            }
        }
    }

    let mut still_running = Vec::new();
    for (stage, mut task, budget) in overrun {
        let grace = deadline.saturating_duration_since(Instant::now()).max(share);

        match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => report.record(stage, stage_result(stage, joined)),
            Err(_) => {
                report.record(
                    stage,
                    Err(ShutdownError::DeadlineExceeded {
                        stage,
                        timeout: budget + grace,
                    }),
                );
                still_running.push(stage);
            }
        }
    }

    (report, still_running)
}

fn stage_result(
    stage: ShutdownStage,
    joined: Result<Result<(), OTelSdkError>, JoinError>,
) -> Result<(), ShutdownError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(ShutdownError::Provider { stage, source }),
        Err(source) => Err(ShutdownError::Panicked { stage, source }),
    }
}

/// Close `channel` unless a provider may still be exporting over it.
fn close_after(
    channel: &CollectorChannel,
    still_running: Vec<ShutdownStage>,
) -> Result<(), ShutdownError> {
    if still_running.is_empty() {
        channel.close()
    } else {
        Err(ShutdownError::ChannelInUse {
            pending: still_running,
        })
    }
}
