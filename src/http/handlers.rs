//! Endpoint handlers.
//!
//! Each handler opens a [`RequestScope`](crate::observability::RequestScope),
//! simulates its work with sampled delays, and reports through the scope.

use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use opentelemetry::logs::AnyValue;
use opentelemetry::KeyValue;
use rand::Rng;

use crate::config::DelayRange;
use crate::http::downstream::DownstreamError;
use crate::http::server::AppState;
use crate::observability::{LogLevel, Operation};

pub const HELLO: Operation = Operation {
    name: "hello",
    route: "/hello",
    subsystem: "hello-handler",
};

pub const WORK: Operation = Operation {
    name: "work",
    route: "/work",
    subsystem: "work-handler",
};

pub const DOWNSTREAM: Operation = Operation {
    name: "downstream",
    route: "/downstream",
    subsystem: "downstream-handler",
};

/// Logger scopes registered at startup, one per endpoint.
pub const SUBSYSTEMS: [&str; 3] = [HELLO.subsystem, WORK.subsystem, DOWNSTREAM.subsystem];

pub async fn hello(State(state): State<AppState>, method: Method, headers: HeaderMap) -> Response {
    let scope = state.telemetry.begin(HELLO, &method, &headers);
    scope.log(LogLevel::Info, "Received request for /hello");

    simulate(state.work.hello).await;
    scope.event("Finished sleeping");

    (StatusCode::OK, "Hello, OpenTelemetry!\n").into_response()
}

pub async fn work(State(state): State<AppState>, method: Method, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let scope = state.telemetry.begin(WORK, &method, &headers);
    scope.log(LogLevel::Info, "Starting complex work");

    simulate(state.work.initial).await;
    scope.event("Initial processing complete");

    scope.log(LogLevel::Info, "Calling downstream service");
    match state.downstream.call(&scope).await {
        Ok(status) => {
            scope.set_attribute(KeyValue::new(
                "downstream.status_code",
                i64::from(status.as_u16()),
            ));
        }
        Err(e) => {
            tracing::warn!(
                request_id = scope.request_id().unwrap_or("-"),
                url = state.downstream.url(),
                error = %e,
                "Downstream call failed"
            );
            if let DownstreamError::Status(status) = &e {
                scope.set_attribute(KeyValue::new(
                    "downstream.status_code",
                    i64::from(status.as_u16()),
                ));
            }
            scope.fail(e.to_string());
            scope.log_with(
                LogLevel::Error,
                "Downstream call failed",
                vec![("error", AnyValue::from(e.to_string()))],
            );
            scope.record_work(started.elapsed(), false);

            return (StatusCode::BAD_GATEWAY, "Failed to call downstream service\n").into_response();
        }
    }

    simulate(state.work.finalize).await;
    scope.event("Final processing complete");

    scope.record_work(started.elapsed(), true);
    scope.log(LogLevel::Info, "Complex work finished");

    (StatusCode::OK, "Work complete!\n").into_response()
}

pub async fn downstream(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let scope = state.telemetry.begin(DOWNSTREAM, &method, &headers);
    scope.log(LogLevel::Info, "Downstream service received request");

    let query_time = simulate(state.work.query).await;
    scope.set_attribute(KeyValue::new(
        "db.query.time_ms",
        query_time.as_secs_f64() * 1000.0,
    ));
    scope.event("Database query finished");

    (StatusCode::OK, "Downstream work done.\n").into_response()
}

/// Sleep for a duration drawn uniformly from `range` and return it.
async fn simulate(range: DelayRange) -> Duration {
    let delay = sample(range);
    tokio::time::sleep(delay).await;
    delay
}

fn sample(range: DelayRange) -> Duration {
    let ms = if range.min_ms >= range.max_ms {
        range.min_ms
    } else {
        rand::thread_rng().gen_range(range.min_ms..=range.max_ms)
    };
    Duration::from_millis(ms)
}
