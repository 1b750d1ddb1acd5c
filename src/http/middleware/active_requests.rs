//! In-flight request gauge.
//!
//! Wraps every endpoint. The gauge is incremented on entry and decremented
//! when the guard drops, so handler errors, timeouts and panics all release
//! their slot.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::observability::Telemetry;

pub async fn track_active_requests(
    State(telemetry): State<Arc<Telemetry>>,
    request: Request,
    next: Next,
) -> Response {
    let _in_flight = telemetry.track_active();
    next.run(request).await
}
