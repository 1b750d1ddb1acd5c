//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::logs::InMemoryLogExporter;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, Metric, MetricData, ResourceMetrics};
use opentelemetry_sdk::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use traced_service::config::{AppConfig, BatchConfig, DelayRange};
use traced_service::http::handlers::SUBSYSTEMS;
use traced_service::lifecycle::{Coordinator, RunningService};
use traced_service::observability::{
    build_resource, ExporterTrio, PipelineSettings, Telemetry, TelemetryPipelines,
};

/// Handles onto the in-memory exporters behind a set of pipelines.
#[derive(Clone)]
pub struct Captured {
    pub spans: InMemorySpanExporter,
    pub metrics: InMemoryMetricExporter,
    pub logs: InMemoryLogExporter,
}

impl Captured {
    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanData> {
        self.spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }

    pub fn metric_batches(&self) -> Vec<ResourceMetrics> {
        self.metrics.get_finished_metrics().unwrap()
    }
}

/// Config suitable for tests: short delays, short deadlines, downstream on `addr`.
pub fn test_config(addr: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bind_address = addr.to_string();
    config.server.drain_timeout_secs = 5;
    config.telemetry.service_name = "test-service".into();
    config.telemetry.otlp_endpoint = "http://127.0.0.1:4317".into();
    config.telemetry.shutdown_timeout_secs = 5;
    config.downstream.url = format!("http://{addr}/downstream");
    config.downstream.timeout_ms = 2_000;
    config.work.hello = DelayRange::fixed(5);
    config.work.initial = DelayRange::fixed(30);
    config.work.finalize = DelayRange::fixed(20);
    config.work.query = DelayRange::fixed(10);
    config
}

/// Pipelines exporting to memory, with a metric interval long enough that
/// only explicit flushes produce metric batches.
pub fn in_memory_pipelines(config: &AppConfig) -> (TelemetryPipelines, Captured) {
    let captured = Captured {
        spans: InMemorySpanExporter::default(),
        metrics: InMemoryMetricExporter::default(),
        logs: InMemoryLogExporter::default(),
    };
    let exporters = ExporterTrio {
        spans: captured.spans.clone(),
        metrics: captured.metrics.clone(),
        logs: captured.logs.clone(),
    };
    let settings = PipelineSettings {
        batch: BatchConfig {
            scheduled_delay_ms: 50,
            ..BatchConfig::default()
        },
        metric_interval: Duration::from_secs(3600),
    };

    let pipelines =
        TelemetryPipelines::build(build_resource(&config.telemetry), exporters, &settings);
    (pipelines, captured)
}

/// Registry plus pipelines, for tests that drive a router in-process.
pub fn in_memory_telemetry(config: &AppConfig) -> (Arc<Telemetry>, TelemetryPipelines, Captured) {
    let (pipelines, captured) = in_memory_pipelines(config);
    let telemetry = Arc::new(Telemetry::install(&pipelines, &SUBSYSTEMS));
    (telemetry, pipelines, captured)
}

/// Launch the full service on an ephemeral port. `customize` runs on the
/// test config before launch.
pub async fn start_service<F>(customize: F) -> (RunningService, Captured, SocketAddr)
where
    F: FnOnce(&mut AppConfig),
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = test_config(addr);
    customize(&mut config);

    let (pipelines, captured) = in_memory_pipelines(&config);
    let service = Coordinator::new(config).launch(listener, pipelines).unwrap();
    (service, captured, addr)
}

/// Non-pooled client that ignores proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// An address nothing is listening on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// The most recently exported metric called `name`.
pub fn latest_metric<'a>(batches: &'a [ResourceMetrics], name: &str) -> Option<&'a Metric> {
    batches
        .iter()
        .rev()
        .flat_map(|batch| batch.scope_metrics())
        .flat_map(|scope| scope.metrics())
        .find(|metric| metric.name() == name)
}

fn matches_attribute<'a>(
    mut attributes: impl Iterator<Item = &'a KeyValue>,
    filter: Option<&KeyValue>,
) -> bool {
    match filter {
        None => true,
        Some(want) => attributes.any(|kv| kv.key == want.key && kv.value == want.value),
    }
}

/// Sum of the u64 counter's data points whose attributes contain `filter`.
pub fn counter_value(batches: &[ResourceMetrics], name: &str, filter: Option<&KeyValue>) -> u64 {
    match latest_metric(batches, name).map(Metric::data) {
        Some(AggregatedMetrics::U64(MetricData::Sum(sum))) => sum
            .data_points()
            .filter(|point| matches_attribute(point.attributes(), filter))
            .map(|point| point.value())
            .sum(),
        _ => 0,
    }
}

/// Sum of the i64 up-down counter's data points.
pub fn gauge_value(batches: &[ResourceMetrics], name: &str) -> i64 {
    match latest_metric(batches, name).map(Metric::data) {
        Some(AggregatedMetrics::I64(MetricData::Sum(sum))) => {
            sum.data_points().map(|point| point.value()).sum()
        }
        _ => 0,
    }
}

/// Number of recordings in the f64 histogram whose attributes contain `filter`.
pub fn histogram_count(batches: &[ResourceMetrics], name: &str, filter: &KeyValue) -> u64 {
    match latest_metric(batches, name).map(Metric::data) {
        Some(AggregatedMetrics::F64(MetricData::Histogram(histogram))) => histogram
            .data_points()
            .filter(|point| matches_attribute(point.attributes(), Some(filter)))
            .map(|point| point.count())
            .sum(),
        _ => 0,
    }
}

pub fn success(value: bool) -> KeyValue {
    KeyValue::new("success", value)
}

pub fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub fn has_event(span: &SpanData, name: &str) -> bool {
    span.events.events.iter().any(|event| event.name == name)
}
