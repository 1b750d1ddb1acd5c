//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the three endpoints
//! - Wire up middleware (tracing, timeout, request ID, active requests, panics)
//! - Bind server to listener and stop accepting on shutdown

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, WorkConfig};
use crate::http::downstream::DownstreamClient;
use crate::http::handlers;
use crate::http::middleware::track_active_requests;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::startup::InitError;
use crate::observability::Telemetry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Arc<Telemetry>,
    pub downstream: DownstreamClient,
    pub work: WorkConfig,
}

/// HTTP server for the instrumented endpoints.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig, telemetry: Arc<Telemetry>) -> Result<Self, InitError> {
        let state = AppState {
            telemetry,
            downstream: DownstreamClient::new(&config.downstream)?,
            work: config.work.clone(),
        };

        Ok(Self {
            router: build_router(config.server.request_timeout(), state),
        })
    }

    /// Serve on `listener` until `shutdown` fires, then finish in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server no longer accepting connections");
            })
            .await
    }
}

/// Build the Axum router with all middleware layers.
///
/// Outermost first: trace, request id, timeout, active requests, panic catcher.
#[allow(deprecated)]
pub fn build_router(request_timeout: Duration, state: AppState) -> Router {
    let telemetry = state.telemetry.clone();

    Router::new()
        .route("/hello", get(handlers::hello))
        .route("/work", get(handlers::work))
        .route("/downstream", get(handlers::downstream))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(telemetry, track_active_requests))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .layer(TraceLayer::new_for_http())
}
