//! Lifecycle tests: state transitions, draining and ordered shutdown.

use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use traced_service::config::DelayRange;
use traced_service::lifecycle::{
    Coordinator, DrainOutcome, InitError, LifecycleState, ShutdownError,
};
use traced_service::observability::registry::ACTIVE_REQUESTS;

mod common;

#[tokio::test(flavor = "multi_thread")]
async fn test_in_flight_request_completes_during_drain() {
    let (mut service, captured, addr) = common::start_service(|config| {
        config.work.hello = DelayRange::fixed(300);
    })
    .await;
    assert_eq!(service.state(), LifecycleState::Running);
    assert_eq!(service.local_addr(), Some(addr));

    let client = common::client();
    let request = tokio::spawn({
        let client = client.clone();
        async move {
            let res = client
                .get(format!("http://{addr}/hello"))
                .send()
                .await
                .unwrap();
            (res.status(), res.text().await.unwrap())
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.drain().await, DrainOutcome::Completed);
    assert_eq!(service.state(), LifecycleState::Draining);

    let (status, body) = request.await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, "Hello, OpenTelemetry!\n");

    // No longer accepting.
    assert!(client
        .get(format!("http://{addr}/hello"))
        .send()
        .await
        .is_err());

    service.pipelines().force_flush().unwrap();
    assert_eq!(captured.spans_named("hello").len(), 1);
    assert!(captured
        .logs
        .get_emitted_logs()
        .unwrap()
        .iter()
        .any(|log| log.instrumentation.name() == "hello-handler"));
    assert_eq!(
        common::gauge_value(&captured.metric_batches(), ACTIVE_REQUESTS),
        0
    );

    service.shutdown().await.unwrap();
    assert_eq!(service.state(), LifecycleState::ShutDown);
    assert!(service.pipelines().is_shut_down());

    assert!(matches!(
        service.shutdown().await,
        Err(ShutdownError::AlreadyShutDown)
    ));
    assert_eq!(service.state(), LifecycleState::ShutDown);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drain_deadline_abandons_slow_requests() {
    let (mut service, _captured, addr) = common::start_service(|config| {
        config.server.drain_timeout_secs = 1;
        config.work.hello = DelayRange::fixed(3_000);
    })
    .await;

    let client = common::client();
    let _slow =
        tokio::spawn(async move { client.get(format!("http://{addr}/hello")).send().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    assert_eq!(service.drain().await, DrainOutcome::Abandoned);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(900), "{waited:?}");
    assert!(waited < Duration::from_millis(2_500), "{waited:?}");

    service.shutdown().await.unwrap();
    assert_eq!(service.state(), LifecycleState::ShutDown);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_without_drain_drains_first() {
    let (mut service, _captured, addr) = common::start_service(|_| {}).await;

    let res = common::client()
        .get(format!("http://{addr}/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    service.shutdown().await.unwrap();
    assert_eq!(service.state(), LifecycleState::ShutDown);
    assert!(common::client()
        .get(format!("http://{addr}/hello"))
        .send()
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_signal_during_request_waits_for_it() {
    let (service, _captured, addr) = common::start_service(|config| {
        config.work.hello = DelayRange::fixed(200);
    })
    .await;
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let request = tokio::spawn(async move {
        let res = common::client()
            .get(format!("http://{addr}/hello"))
            .send()
            .await
            .unwrap();
        res.status()
    });

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = signal_tx.send(());
    });

    let result = service
        .run_until(async {
            let _ = signal_rx.await;
        })
        .await;
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(request.await.unwrap(), 200);
}

#[tokio::test]
async fn test_invalid_config_ends_lifecycle() {
    let mut config = common::test_config(common::refused_addr().await);
    config.telemetry.service_name.clear();

    let coordinator = Coordinator::new(config);
    assert_eq!(coordinator.state(), LifecycleState::Uninitialized);

    let err = coordinator.initialize().await.unwrap_err();
    assert!(matches!(err, InitError::Config(_)), "{err}");
    assert_eq!(err.stage(), "config");
    assert_eq!(coordinator.state(), LifecycleState::ShutDown);

    let err = coordinator.initialize().await.unwrap_err();
    assert!(matches!(err, InitError::State(LifecycleState::ShutDown)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_launch_rejected_after_lifecycle_ended() {
    let mut config = common::test_config(common::refused_addr().await);
    config.telemetry.otlp_endpoint.clear();

    let coordinator = Coordinator::new(config.clone());
    assert!(coordinator.initialize().await.is_err());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (pipelines, _captured) = common::in_memory_pipelines(&config);
    let err = coordinator.launch(listener, pipelines).err().unwrap();
    assert!(matches!(err, InitError::State(LifecycleState::ShutDown)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_launch_with_caller_pipelines_enters_running() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = common::test_config(listener.local_addr().unwrap());
    let (pipelines, _captured) = common::in_memory_pipelines(&config);

    let coordinator = Coordinator::new(config);
    assert_eq!(coordinator.state(), LifecycleState::Uninitialized);

    let mut service = coordinator.launch(listener, pipelines).unwrap();
    assert_eq!(service.state(), LifecycleState::Running);

    service.shutdown().await.unwrap();
    assert_eq!(service.state(), LifecycleState::ShutDown);
}
