//! Trace context propagation over HTTP headers.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Inject the active context into outbound requests
//!
//! # Design Decisions
//! - W3C Trace Context (`traceparent`, `tracestate`)
//! - Carriers wrap a plain `HeaderMap`, so the logic is independent of the
//!   HTTP client and testable without a network call

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Write-side carrier over a header map.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            return;
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            self.0.insert(name, value);
        }
    }
}

/// Read-side carrier over a header map.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Propagator owned by the telemetry registry.
#[derive(Debug, Default)]
pub struct Propagation {
    inner: TraceContextPropagator,
}

impl Propagation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carried by `headers`, or an empty context if they carry none.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.inner
            .extract_with_context(&Context::new(), &HeaderExtractor(headers))
    }

    /// Write the span context of `cx` into `headers`.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        self.inner.inject_context(cx, &mut HeaderInjector(headers));
    }
}
