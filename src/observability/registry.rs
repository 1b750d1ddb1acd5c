//! Process-wide telemetry registry.
//!
//! # Responsibilities
//! - Hold the tracer, instruments, loggers and propagator built at startup
//! - Open a scoped span per request and emit correlated log records
//! - Track in-flight requests
//!
//! # Design Decisions
//! - Built once from [`TelemetryPipelines`] and injected as `Arc<Telemetry>`;
//!   it never owns or shuts down a provider
//! - Instruments are created here and nowhere else
//! - Span end is tied to `Drop` of [`RequestScope`], covering early returns,
//!   timeouts and panics

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use axum::http::{HeaderMap, Method};
use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, Severity};
use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, TraceId, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::logs::SdkLogger;
use opentelemetry_sdk::trace::SdkTracer;

use crate::http::request::X_REQUEST_ID;
use crate::observability::pipelines::TelemetryPipelines;
use crate::observability::propagation::Propagation;

/// Instrumentation scope name for the tracer, meter and fallback logger.
pub const INSTRUMENTATION_SCOPE: &str = "traced-service";

pub const REQUESTS_TOTAL: &str = "http.server.requests_total";
pub const ACTIVE_REQUESTS: &str = "http.server.active_requests";
pub const WORK_DURATION: &str = "app.work.duration";

/// A named, routed unit of request handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Span name.
    pub name: &'static str,
    /// Value of the `http.route` attribute.
    pub route: &'static str,
    /// Logger scope the operation emits through.
    pub subsystem: &'static str,
}

/// Severity of an emitted log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    pub fn severity(self) -> Severity {
        match self {
            LogLevel::Info => Severity::Info,
            LogLevel::Error => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        }
    }
}

struct Instruments {
    requests_total: Counter<u64>,
    active_requests: UpDownCounter<i64>,
    work_duration: Histogram<f64>,
}

/// Emitters shared by every request handler.
pub struct Telemetry {
    tracer: SdkTracer,
    propagation: Propagation,
    instruments: Instruments,
    loggers: HashMap<&'static str, SdkLogger>,
    fallback_logger: SdkLogger,
}

impl Telemetry {
    /// Create the tracer, instruments, and one logger per subsystem.
    pub fn install(pipelines: &TelemetryPipelines, subsystems: &[&'static str]) -> Self {
        let meter = pipelines.meter(INSTRUMENTATION_SCOPE);

        let instruments = Instruments {
            requests_total: meter
                .u64_counter(REQUESTS_TOTAL)
                .with_description("Total number of incoming HTTP requests.")
                .with_unit("{request}")
                .build(),
            active_requests: meter
                .i64_up_down_counter(ACTIVE_REQUESTS)
                .with_description("Number of active HTTP requests.")
                .with_unit("{request}")
                .build(),
            work_duration: meter
                .f64_histogram(WORK_DURATION)
                .with_description("Duration of the work operation.")
                .with_unit("s")
                .build(),
        };

        let loggers = subsystems
            .iter()
            .map(|&name| (name, pipelines.logger(name)))
            .collect();

        Self {
            tracer: pipelines.tracer(INSTRUMENTATION_SCOPE),
            propagation: Propagation::new(),
            instruments,
            loggers,
            fallback_logger: pipelines.logger(INSTRUMENTATION_SCOPE),
        }
    }

    pub fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    fn logger(&self, subsystem: &str) -> &SdkLogger {
        self.loggers.get(subsystem).unwrap_or(&self.fallback_logger)
    }

    /// Start the server span for `op` and count the request.
    ///
    /// The span continues any trace carried by `headers`; otherwise it is a root.
    pub fn begin(&self, op: Operation, method: &Method, headers: &HeaderMap) -> RequestScope<'_> {
        let parent = self.propagation.extract(headers);
        let span = self
            .tracer
            .span_builder(op.name)
            .with_kind(SpanKind::Server)
            .with_attributes([
                KeyValue::new("http.request.method", method.to_string()),
                KeyValue::new("http.route", op.route),
            ])
            .start_with_context(&self.tracer, &parent);
        let cx = parent.with_span(span);

        self.instruments
            .requests_total
            .add(1, &[KeyValue::new("http.route", op.route)]);

        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        RequestScope {
            telemetry: self,
            op,
            cx,
            method: method.to_string(),
            request_id,
        }
    }

    /// Count a request as in flight until the returned guard drops.
    pub fn track_active(&self) -> ActiveRequestGuard<'_> {
        self.instruments.active_requests.add(1, &[]);
        ActiveRequestGuard {
            counter: &self.instruments.active_requests,
        }
    }
}

/// An open request span. Dropping the scope ends the span.
pub struct RequestScope<'a> {
    telemetry: &'a Telemetry,
    op: Operation,
    cx: Context,
    method: String,
    request_id: Option<String>,
}

impl RequestScope<'_> {
    /// Context holding this request's span, for propagation and child spans.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn trace_id(&self) -> TraceId {
        self.cx.span().span_context().trace_id()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Write this request's trace context into outgoing `headers`.
    pub fn inject(&self, headers: &mut HeaderMap) {
        self.telemetry.propagation.inject(&self.cx, headers);
    }

    pub fn event(&self, name: &'static str) {
        self.cx.span().add_event(name, Vec::new());
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Mark the span as failed.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        let span = self.cx.span();
        span.add_event(
            "exception",
            vec![KeyValue::new("exception.message", message.clone())],
        );
        span.set_status(Status::error(message));
    }

    /// Record the duration of the operation's work, tagged with its outcome.
    pub fn record_work(&self, elapsed: Duration, success: bool) {
        self.telemetry
            .instruments
            .work_duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("success", success)]);
    }

    pub fn log(&self, level: LogLevel, body: impl Into<String>) {
        self.log_with(level, body, Vec::new());
    }

    /// Emit a log record correlated with this request's span.
    pub fn log_with(
        &self,
        level: LogLevel,
        body: impl Into<String>,
        attributes: Vec<(&'static str, AnyValue)>,
    ) {
        let logger = self.telemetry.logger(self.op.subsystem);
        let mut record = logger.create_log_record();
        let now = SystemTime::now();

        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(level.severity());
        record.set_severity_text(level.as_str());
        record.set_body(AnyValue::from(body.into()));
        record.add_attribute("http.request.method", self.method.clone());
        record.add_attribute("http.route", self.op.route);
        if let Some(id) = &self.request_id {
            record.add_attribute("request.id", id.clone());
        }
        for (key, value) in attributes {
            record.add_attribute(key, value);
        }

        let span = self.cx.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            record.set_trace_context(
                span_context.trace_id(),
                span_context.span_id(),
                Some(span_context.trace_flags()),
            );
        }

        logger.emit(record);
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// Decrements the active-request gauge when dropped.
pub struct ActiveRequestGuard<'a> {
    counter: &'a UpDownCounter<i64>,
}

impl Drop for ActiveRequestGuard<'_> {
    fn drop(&mut self) {
        self.counter.add(-1, &[]);
    }
}
