//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Resource → Channel → Exporters → Providers
//!
//! Launch (coordinator.rs):
//!     Registry → HTTP server → Running
//!
//! Shutdown (coordinator.rs, shutdown.rs):
//!     Signal received → Stop accepting → Drain (bounded) →
//!     Tracer → Meter → Logger → Channel
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then pipelines, then listeners
//! - Ordered shutdown: stop accept, drain, flush, close channel
//! - Drain and shutdown both have deadlines
//! - Shutdown never stops at the first failing stage

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use coordinator::{Coordinator, DrainOutcome, RunningService};
pub use shutdown::{Shutdown, ShutdownError, ShutdownReport, ShutdownStage};
pub use startup::InitError;
pub use state::{LifecycleState, StateCell};
