//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the instrumented service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener and draining settings.
    pub server: ServerConfig,

    /// Export pipeline settings.
    pub telemetry: TelemetryConfig,

    /// Target of the internal service-to-service call.
    pub downstream: DownstreamConfig,

    /// Simulated work performed by each endpoint.
    pub work: WorkConfig,

    /// Operator log output.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound on waiting for in-flight requests after a termination signal.
    pub drain_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            drain_timeout_secs: 5,
        }
    }
}

/// Telemetry pipeline configuration.
///
/// `service_name` and `otlp_endpoint` have no usable default: they must be
/// supplied by the file or the environment, otherwise validation fails.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Value of the `service.name` resource attribute.
    pub service_name: String,

    /// Collector gRPC endpoint (e.g., "http://otel-collector:4317").
    pub otlp_endpoint: String,

    /// Deadline for a single export RPC in milliseconds.
    pub export_timeout_ms: u64,

    /// Retry policy for opening the collector channel.
    pub connect: ConnectConfig,

    /// Batching for the trace and log pipelines.
    pub batch: BatchConfig,

    /// Period of the metric reader in milliseconds.
    pub metric_interval_ms: u64,

    /// Overall deadline for provider and channel shutdown in seconds.
    pub shutdown_timeout_secs: u64,

    /// Extra attributes attached to the resource.
    pub resource_attributes: BTreeMap<String, String>,
}

impl TelemetryConfig {
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    pub fn metric_interval(&self) -> Duration {
        Duration::from_millis(self.metric_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            otlp_endpoint: String::new(),
            export_timeout_ms: 10_000,
            connect: ConnectConfig::default(),
            batch: BatchConfig::default(),
            metric_interval_ms: 60_000,
            shutdown_timeout_secs: 10,
            resource_attributes: BTreeMap::new(),
        }
    }
}

/// Collector connection retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Number of connection attempts before startup fails.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Timeout of a single connection attempt in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            timeout_ms: 3_000,
        }
    }
}

/// Batch processor configuration shared by the trace and log pipelines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records buffered before new ones are dropped.
    pub max_queue_size: usize,

    /// Records sent per export call.
    pub max_export_batch_size: usize,

    /// Maximum age of a batch before it is flushed, in milliseconds.
    pub scheduled_delay_ms: u64,
}

impl BatchConfig {
    pub fn scheduled_delay(&self) -> Duration {
        Duration::from_millis(self.scheduled_delay_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2_048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5_000,
        }
    }
}

/// Downstream call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// URL of the downstream endpoint.
    pub url: String,

    /// Timeout for the downstream call in milliseconds.
    pub timeout_ms: u64,
}

impl DownstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/downstream".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Inclusive range of milliseconds a simulated step takes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }
}

/// Simulated work for each endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkConfig {
    /// `/hello` processing time.
    pub hello: DelayRange,

    /// `/work` processing before the downstream call.
    pub initial: DelayRange,

    /// `/work` processing after the downstream call.
    pub finalize: DelayRange,

    /// `/downstream` query time.
    pub query: DelayRange,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            hello: DelayRange::fixed(50),
            initial: DelayRange::new(75, 124),
            finalize: DelayRange::new(50, 74),
            query: DelayRange::new(100, 249),
        }
    }
}

/// Operator log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Operator logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "traced_service=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
