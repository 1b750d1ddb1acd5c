//! Resource descriptor shared by all three pipelines.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use crate::config::TelemetryConfig;

/// Build the process identity attached to every span, data point and log record.
///
/// Explicit attributes from the config win over anything the SDK detectors
/// pick up from the environment; `service.name` always comes from the config.
pub fn build_resource(config: &TelemetryConfig) -> Resource {
    let extra = config
        .resource_attributes
        .iter()
        .filter(|(key, _)| key.as_str() != "service.name")
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()));

    Resource::builder()
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .with_attributes(extra)
        .with_service_name(config.service_name.clone())
        .build()
}
