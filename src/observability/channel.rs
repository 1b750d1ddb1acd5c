//! Shared gRPC channel to the collector.
//!
//! # Responsibilities
//! - Open one long-lived connection used by all three exporters
//! - Hand out cheap clones of the connection to exporter builders
//! - Close exactly once, after every provider has flushed
//!
//! # Design Decisions
//! - Connection is established eagerly with bounded retries; an unreachable
//!   collector is a startup failure, not a silent lazy reconnect loop
//! - `tonic::transport::Channel` is internally reference counted, so "close"
//!   means releasing the coordinator's handle and refusing new clones

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use crate::config::TelemetryConfig;
use crate::lifecycle::shutdown::ShutdownError;
use crate::lifecycle::startup::InitError;
use crate::resilience::{retry, RetryPolicy};

/// Owner of the outbound channel to the collector.
#[derive(Debug)]
pub struct CollectorChannel {
    endpoint: String,
    inner: Mutex<Option<Channel>>,
}

impl CollectorChannel {
    /// Connect to `config.otlp_endpoint`, retrying per `config.connect`.
    pub async fn connect(config: &TelemetryConfig) -> Result<Self, InitError> {
        let endpoint = Self::endpoint(config)?;
        let policy = RetryPolicy::from(&config.connect);

        let channel = retry(policy, |attempt| {
            let endpoint = endpoint.clone();
            async move {
                tracing::debug!(
                    endpoint = %config.otlp_endpoint,
                    attempt,
                    "Connecting to collector"
                );
                endpoint.connect().await
            }
        })
        .await
        .map_err(|exhausted| InitError::Channel {
            endpoint: config.otlp_endpoint.clone(),
            attempts: exhausted.attempts,
            source: exhausted.last_error,
        })?;

        tracing::info!(endpoint = %config.otlp_endpoint, "Collector channel open");
        Ok(Self::from_channel(config.otlp_endpoint.clone(), channel))
    }

    /// Create a channel that connects on first use. Must be called inside a Tokio runtime.
    pub fn lazy(config: &TelemetryConfig) -> Result<Self, InitError> {
        let channel = Self::endpoint(config)?.connect_lazy();
        Ok(Self::from_channel(config.otlp_endpoint.clone(), channel))
    }

    fn from_channel(endpoint: String, channel: Channel) -> Self {
        Self {
            endpoint,
            inner: Mutex::new(Some(channel)),
        }
    }

    fn endpoint(config: &TelemetryConfig) -> Result<Endpoint, InitError> {
        let endpoint = Endpoint::from_shared(config.otlp_endpoint.clone()).map_err(|source| {
            InitError::Endpoint {
                endpoint: config.otlp_endpoint.clone(),
                source,
            }
        })?;

        Ok(endpoint
            .connect_timeout(Duration::from_millis(config.connect.timeout_ms))
            .timeout(config.export_timeout()))
    }

    /// The collector address this channel points at.
    pub fn target(&self) -> &str {
        &self.endpoint
    }

    /// Clone the underlying channel for an exporter.
    pub fn handle(&self) -> Result<Channel, InitError> {
        self.lock().clone().ok_or(InitError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Release the channel. A second call reports [`ShutdownError::ChannelAlreadyClosed`].
    pub fn close(&self) -> Result<(), ShutdownError> {
        match self.lock().take() {
            Some(channel) => {
                drop(channel);
                tracing::debug!(endpoint = %self.endpoint, "Collector channel closed");
                Ok(())
            }
            None => Err(ShutdownError::ChannelAlreadyClosed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Channel>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: "svc".into(),
            otlp_endpoint: endpoint.into(),
            ..TelemetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_close_is_single_shot() {
        let channel = CollectorChannel::lazy(&config("http://127.0.0.1:4317")).unwrap();
        assert!(channel.handle().is_ok());

        channel.close().unwrap();
        assert!(channel.is_closed());
        assert!(matches!(channel.handle(), Err(InitError::ChannelClosed)));
        assert!(matches!(channel.close(), Err(ShutdownError::ChannelAlreadyClosed)));
    }

    #[tokio::test]
    async fn test_unreachable_collector_fails_after_bounded_attempts() {
        let mut cfg = config("http://127.0.0.1:1");
        cfg.connect.max_attempts = 2;
        cfg.connect.base_delay_ms = 1;
        cfg.connect.max_delay_ms = 1;
        cfg.connect.timeout_ms = 200;

        match CollectorChannel::connect(&cfg).await {
            Err(InitError::Channel { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected channel error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_malformed_endpoint() {
        let result = CollectorChannel::lazy(&config("not a uri"));
        assert!(matches!(result, Err(InitError::Endpoint { .. })));
    }
}
