//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (add/echo request ID)
//!     → middleware/active_requests.rs (in-flight gauge)
//!     → handlers.rs (span, logs, metrics, simulated work)
//!     → downstream.rs (/work only: propagated call to /downstream)
//! ```

pub mod downstream;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use downstream::{DownstreamClient, DownstreamError};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{build_router, AppState, HttpServer};
