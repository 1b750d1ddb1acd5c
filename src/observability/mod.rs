//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     resource.rs (service identity)
//!     → channel.rs (one gRPC connection to the collector)
//!     → exporters.rs (trace, metric, log exporters on that channel)
//!     → pipelines.rs (batching / periodic providers)
//!     → registry.rs (tracer, instruments, loggers handed to handlers)
//!
//! Per request:
//!     propagation.rs (extract inbound context, inject outbound)
//!     → registry.rs (span scope, counters, correlated log records)
//!
//! Shutdown:
//!     pipelines.rs (traces → metrics → logs → channel)
//! ```
//!
//! # Design Decisions
//! - Signals are exported independently; only the resource and channel are shared
//! - Request code never blocks on export
//! - logging.rs covers operator logs on stdout, not the exported log signal

use std::fmt;

pub mod channel;
pub mod exporters;
pub mod logging;
pub mod pipelines;
pub mod propagation;
pub mod registry;
pub mod resource;

pub use channel::CollectorChannel;
pub use exporters::{otlp_exporters, ExporterTrio, OtlpExporters};
pub use pipelines::{PipelineSettings, TelemetryPipelines};
pub use propagation::{HeaderExtractor, HeaderInjector, Propagation};
pub use registry::{ActiveRequestGuard, LogLevel, Operation, RequestScope, Telemetry};
pub use resource::build_resource;

/// Telemetry signal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Traces => f.write_str("trace"),
            Signal::Metrics => f.write_str("metric"),
            Signal::Logs => f.write_str("log"),
        }
    }
}
