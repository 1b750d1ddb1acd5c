//! Traced HTTP service library.
//!
//! OpenTelemetry traces, metrics and logs for a small multi-endpoint HTTP
//! service, exported over one shared OTLP/gRPC channel.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{Coordinator, RunningService, Shutdown};
pub use observability::{Telemetry, TelemetryPipelines};
