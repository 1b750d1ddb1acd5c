//! Lifecycle coordinator.
//!
//! Owns the telemetry pipelines and the HTTP server task, and walks them
//! through the lifecycle states. It is the only component that may shut a
//! provider down or close the collector channel.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};

use crate::config::AppConfig;
use crate::http::handlers::SUBSYSTEMS;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{Shutdown, ShutdownError};
use crate::lifecycle::startup::{build_otlp_pipelines, InitError};
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::observability::{Telemetry, TelemetryPipelines};

/// How draining the HTTP server ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished (or the server had already stopped).
    Completed,
    /// The drain deadline passed and remaining requests were abandoned.
    Abandoned,
}

/// Builds the service and hands out a [`RunningService`].
pub struct Coordinator {
    config: AppConfig,
    state: Arc<StateCell>,
}

impl Coordinator {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: Arc::new(StateCell::new()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the OTLP pipelines. Any failure ends the lifecycle.
    pub async fn initialize(&self) -> Result<TelemetryPipelines, InitError> {
        self.state
            .transition(LifecycleState::Uninitialized, LifecycleState::Initializing)
            .map_err(InitError::State)?;

        build_otlp_pipelines(&self.config).await.map_err(|e| {
            tracing::error!(stage = e.stage(), error = %e, "Startup aborted");
            self.state.finish();
            e
        })
    }

    /// Install the registry, start serving on `listener`, and enter `Running`.
    ///
    /// `pipelines` normally comes from [`Coordinator::initialize`]. Pipelines
    /// built by the caller are accepted too; the coordinator then passes
    /// through `Initializing` itself.
    pub fn launch(
        self,
        listener: TcpListener,
        pipelines: TelemetryPipelines,
    ) -> Result<RunningService, InitError> {
        if self.state.get() == LifecycleState::Uninitialized {
            self.state
                .transition(LifecycleState::Uninitialized, LifecycleState::Initializing)
                .map_err(InitError::State)?;
        }
        let current = self.state.get();
        if current != LifecycleState::Initializing {
            return Err(InitError::State(current));
        }

        let telemetry = Arc::new(Telemetry::install(&pipelines, &SUBSYSTEMS));
        let server = HttpServer::new(&self.config, telemetry).map_err(|e| {
            tracing::error!(stage = e.stage(), error = %e, "Startup aborted");
            self.state.finish();
            e
        })?;
        let local_addr = listener.local_addr().ok();

        let shutdown = Shutdown::new();
        let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

        self.state
            .transition(LifecycleState::Initializing, LifecycleState::Running)
            .map_err(InitError::State)?;
        tracing::info!(address = ?local_addr, "Service running");

        Ok(RunningService {
            state: self.state,
            shutdown,
            server: Some(server_task),
            pipelines,
            local_addr,
            drain_timeout: self.config.server.drain_timeout(),
            shutdown_timeout: self.config.telemetry.shutdown_timeout(),
        })
    }
}

/// A service that is accepting traffic.
pub struct RunningService {
    state: Arc<StateCell>,
    shutdown: Shutdown,
    server: Option<JoinHandle<io::Result<()>>>,
    pipelines: TelemetryPipelines,
    local_addr: Option<SocketAddr>,
    drain_timeout: Duration,
    shutdown_timeout: Duration,
}

impl RunningService {
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn pipelines(&self) -> &TelemetryPipelines {
        &self.pipelines
    }

    /// Stop accepting connections and wait, up to the drain deadline, for in-flight requests.
    pub async fn drain(&mut self) -> DrainOutcome {
        let Some(mut server) = self.server.take() else {
            return DrainOutcome::Completed;
        };

        let _ = self
            .state
            .transition(LifecycleState::Running, LifecycleState::Draining);
        tracing::info!(deadline = ?self.drain_timeout, "Draining HTTP server");
        self.shutdown.trigger();

        match tokio::time::timeout(self.drain_timeout, &mut server).await {
            Ok(result) => {
                log_server_exit(result);
                DrainOutcome::Completed
            }
            Err(_) => {
                tracing::warn!(
                    deadline = ?self.drain_timeout,
                    "Drain deadline reached, abandoning in-flight requests"
                );
                server.abort();
                DrainOutcome::Abandoned
            }
        }
    }

    /// Drain if still serving, then shut down traces, metrics, logs and the channel.
    ///
    /// Returns the first stage failure. A second call returns
    /// [`ShutdownError::AlreadyShutDown`].
    pub async fn shutdown(&mut self) -> Result<(), ShutdownError> {
        if self.server.is_some() {
            self.drain().await;
        }

        let report = self.pipelines.shutdown(self.shutdown_timeout).await;
        self.state.finish();

        if report.is_clean() {
            tracing::info!(stages = report.completed.len(), "Telemetry shut down");
        }
        report.into_result()
    }

    /// Serve until `signal` resolves (or the server stops on its own), then drain and shut down.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()>,
    {
        let server_stopped = {
            let server = self.server.as_mut();
            tokio::select! {
                _ = signal => false,
                result = wait_for(server) => {
                    log_server_exit(result);
                    true
                }
            }
        };
        if server_stopped {
            self.server = None;
        }

        self.drain().await;
        self.shutdown().await
    }
}

async fn wait_for(
    server: Option<&mut JoinHandle<io::Result<()>>>,
) -> Result<io::Result<()>, JoinError> {
    match server {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn log_server_exit(result: Result<io::Result<()>, JoinError>) {
    match result {
        Ok(Ok(())) => tracing::info!("HTTP server stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }
}
