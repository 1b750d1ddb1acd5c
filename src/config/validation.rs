//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require the service identity and collector endpoint
//! - Validate value ranges (timeouts > 0, batch sizes, delay ranges)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before any pipeline is built

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{AppConfig, DelayRange};

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.drain_timeout_secs == 0 {
        errors.push(ValidationError::new("server.drain_timeout_secs", "must be > 0"));
    }

    let telemetry = &config.telemetry;
    if telemetry.service_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "telemetry.service_name",
            "is required (set OTEL_SERVICE_NAME)",
        ));
    }
    if telemetry.otlp_endpoint.trim().is_empty() {
        errors.push(ValidationError::new(
            "telemetry.otlp_endpoint",
            "is required (set OTEL_EXPORTER_OTLP_ENDPOINT)",
        ));
    } else if let Err(message) = check_http_url(&telemetry.otlp_endpoint) {
        errors.push(ValidationError::new("telemetry.otlp_endpoint", message));
    }
    if telemetry.export_timeout_ms == 0 {
        errors.push(ValidationError::new("telemetry.export_timeout_ms", "must be > 0"));
    }
    if telemetry.metric_interval_ms == 0 {
        errors.push(ValidationError::new("telemetry.metric_interval_ms", "must be > 0"));
    }
    if telemetry.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new("telemetry.shutdown_timeout_secs", "must be > 0"));
    }
    if telemetry.connect.max_attempts == 0 {
        errors.push(ValidationError::new("telemetry.connect.max_attempts", "must be >= 1"));
    }
    if telemetry.connect.timeout_ms == 0 {
        errors.push(ValidationError::new("telemetry.connect.timeout_ms", "must be > 0"));
    }
    if telemetry.connect.base_delay_ms > telemetry.connect.max_delay_ms {
        errors.push(ValidationError::new(
            "telemetry.connect.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }

    let batch = &telemetry.batch;
    if batch.max_export_batch_size == 0 {
        errors.push(ValidationError::new(
            "telemetry.batch.max_export_batch_size",
            "must be > 0",
        ));
    }
    if batch.max_export_batch_size > batch.max_queue_size {
        errors.push(ValidationError::new(
            "telemetry.batch.max_export_batch_size",
            "must not exceed max_queue_size",
        ));
    }
    if batch.scheduled_delay_ms == 0 {
        errors.push(ValidationError::new("telemetry.batch.scheduled_delay_ms", "must be > 0"));
    }

    if let Err(message) = check_http_url(&config.downstream.url) {
        errors.push(ValidationError::new("downstream.url", message));
    }
    if config.downstream.timeout_ms == 0 {
        errors.push(ValidationError::new("downstream.timeout_ms", "must be > 0"));
    }

    for (field, range) in [
        ("work.hello", config.work.hello),
        ("work.initial", config.work.initial),
        ("work.finalize", config.work.finalize),
        ("work.query", config.work.query),
    ] {
        if let Some(error) = check_range(field, range) {
            errors.push(error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(()),
        "http" | "https" => Err(format!("'{}' has no host", raw)),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

fn check_range(field: &'static str, range: DelayRange) -> Option<ValidationError> {
    (range.min_ms > range.max_ms)
        .then(|| ValidationError::new(field, "min_ms must not exceed max_ms"))
}
