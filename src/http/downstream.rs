//! Client for the internal downstream call.
//!
//! The outgoing request carries the caller's trace context and request id,
//! so the callee's span joins the caller's trace.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use thiserror::Error;

use crate::config::DownstreamConfig;
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::startup::InitError;
use crate::observability::RequestScope;

#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("downstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("downstream responded with {0}")]
    Status(StatusCode),
}

/// HTTP client bound to the downstream URL.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    client: reqwest::Client,
    url: String,
}

impl DownstreamClient {
    pub fn new(config: &DownstreamConfig) -> Result<Self, InitError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .no_proxy()
            .build()
            .map_err(InitError::HttpClient)?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call the downstream endpoint within `scope`'s trace.
    ///
    /// Non-2xx responses are errors.
    pub async fn call(&self, scope: &RequestScope<'_>) -> Result<StatusCode, DownstreamError> {
        let mut headers = HeaderMap::new();
        scope.inject(&mut headers);
        if let Some(id) = scope.request_id().and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(X_REQUEST_ID, id);
        }

        let response = self.client.get(&self.url).headers(headers).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(status)
        } else {
            Err(DownstreamError::Status(status))
        }
    }
}
