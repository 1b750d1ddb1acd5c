//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overlay (OTEL_SERVICE_NAME, OTEL_EXPORTER_OTLP_ENDPOINT, ...)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Every field except the service identity has a default
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, BatchConfig, ConnectConfig, DelayRange, DownstreamConfig, LogFormat,
    LoggingConfig, ServerConfig, TelemetryConfig, WorkConfig,
};
