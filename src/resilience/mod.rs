//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Opening the collector channel:
//!     → backoff.rs (bounded attempts, exponential backoff + jitter)
//!     → exhausted → startup fails with the last connection error
//! ```
//!
//! # Design Decisions
//! - Every retry loop is bounded; nothing retries forever
//! - Jittered backoff prevents synchronized reconnect storms

pub mod backoff;

pub use backoff::{calculate_backoff, retry, Exhausted, RetryPolicy};
