//! End-to-end export over OTLP/gRPC to an in-process collector.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

use traced_service::lifecycle::{Coordinator, LifecycleState};

mod common;

/// Counts what each OTLP service receives.
#[derive(Clone, Default)]
struct Collector {
    spans: Arc<AtomicUsize>,
    metric_exports: Arc<AtomicUsize>,
    log_records: Arc<AtomicUsize>,
}

#[tonic::async_trait]
impl TraceService for Collector {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let spans: usize = request
            .into_inner()
            .resource_spans
            .iter()
            .flat_map(|resource| &resource.scope_spans)
            .map(|scope| scope.spans.len())
            .sum();
        self.spans.fetch_add(spans, Ordering::SeqCst);
        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl MetricsService for Collector {
    async fn export(
        &self,
        _request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        self.metric_exports.fetch_add(1, Ordering::SeqCst);
        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl LogsService for Collector {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let records: usize = request
            .into_inner()
            .resource_logs
            .iter()
            .flat_map(|resource| &resource.scope_logs)
            .map(|scope| scope.log_records.len())
            .sum();
        self.log_records.fetch_add(records, Ordering::SeqCst);
        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: None,
        }))
    }
}

async fn start_collector() -> (Collector, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let collector = Collector::default();

    let server = tonic::transport::Server::builder()
        .add_service(TraceServiceServer::new(collector.clone()))
        .add_service(MetricsServiceServer::new(collector.clone()))
        .add_service(LogsServiceServer::new(collector.clone()))
        .serve_with_incoming(TcpListenerStream::new(listener));
    tokio::spawn(server);

    (collector, addr)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_flushes_every_signal_to_collector() {
    let (collector, collector_addr) = start_collector().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut config = common::test_config(addr);
    config.telemetry.otlp_endpoint = format!("http://{collector_addr}");

    let coordinator = Coordinator::new(config);
    let pipelines = coordinator.initialize().await.unwrap();
    assert!(pipelines.channel().is_some());
    let mut service = coordinator.launch(listener, pipelines).unwrap();

    let res = common::client()
        .get(format!("http://{addr}/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    // Nothing is flushed explicitly: shutdown alone must deliver the batches.
    service.shutdown().await.unwrap();
    assert_eq!(service.state(), LifecycleState::ShutDown);
    assert!(service
        .pipelines()
        .channel()
        .is_some_and(|channel| channel.is_closed()));

    assert_eq!(collector.spans.load(Ordering::SeqCst), 1);
    assert!(collector.metric_exports.load(Ordering::SeqCst) >= 1);
    assert_eq!(collector.log_records.load(Ordering::SeqCst), 1);
}
