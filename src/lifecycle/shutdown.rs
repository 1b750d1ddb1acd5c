//! Shutdown coordination.

use std::fmt;
use std::time::Duration;

use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Teardown stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    Traces,
    Metrics,
    Logs,
    Channel,
}

impl fmt::Display for ShutdownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownStage::Traces => f.write_str("tracer provider"),
            ShutdownStage::Metrics => f.write_str("meter provider"),
            ShutdownStage::Logs => f.write_str("logger provider"),
            ShutdownStage::Channel => f.write_str("collector channel"),
        }
    }
}

/// Failure of one teardown stage.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("telemetry pipelines were already shut down")]
    AlreadyShutDown,

    #[error("{stage} shutdown failed")]
    Provider {
        stage: ShutdownStage,
        #[source]
        source: OTelSdkError,
    },

    #[error("{stage} shutdown did not finish within {timeout:?}")]
    DeadlineExceeded {
        stage: ShutdownStage,
        timeout: Duration,
    },

    #[error("{stage} shutdown task panicked")]
    Panicked {
        stage: ShutdownStage,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("collector channel was already closed")]
    ChannelAlreadyClosed,

    #[error("collector channel left open: {pending:?} still shutting down")]
    ChannelInUse { pending: Vec<ShutdownStage> },
}

impl ShutdownError {
    /// The stage that failed, if the error belongs to one.
    pub fn stage(&self) -> Option<ShutdownStage> {
        match self {
            ShutdownError::Provider { stage, .. }
            | ShutdownError::DeadlineExceeded { stage, .. }
            | ShutdownError::Panicked { stage, .. } => Some(*stage),
            ShutdownError::ChannelAlreadyClosed | ShutdownError::ChannelInUse { .. } => {
                Some(ShutdownStage::Channel)
            }
            ShutdownError::AlreadyShutDown => None,
        }
    }
}

/// Outcome of a full teardown: which stages finished and which failed.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub completed: Vec<ShutdownStage>,
    pub failures: Vec<ShutdownError>,
}

impl ShutdownReport {
    pub(crate) fn record(&mut self, stage: ShutdownStage, result: Result<(), ShutdownError>) {
        match result {
            Ok(()) => self.completed.push(stage),
            Err(error) => {
                tracing::error!(stage = %stage, error = %error, "Shutdown stage failed");
                self.failures.push(error);
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure, if any.
    pub fn into_result(self) -> Result<(), ShutdownError> {
        match self.failures.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
