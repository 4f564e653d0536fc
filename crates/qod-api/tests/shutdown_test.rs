//! End-to-end shutdown behaviour against a real listener.

mod helpers;

use axum::{routing::get, Router};
use qod_api::setup::server::serve;
use qod_infra::{ServerLifecycle, ShutdownCoordinator, ShutdownOutcome};
use std::future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// App whose `/slow` handler signals `started` on entry, then takes `delay`.
fn slow_app(delay: Duration, started: Arc<Notify>) -> Router {
    Router::new().route(
        "/slow",
        get(move || async move {
            started.notify_one();
            sleep(delay).await;
            "done"
        }),
    )
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

#[tokio::test]
async fn test_in_flight_request_completes_during_drain() {
    let (listener, base) = bind().await;
    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(5)));
    let shutdown = coordinator.shutdown_token();
    let started = Arc::new(Notify::new());

    let server = {
        let coordinator = coordinator.clone();
        let app = slow_app(Duration::from_millis(300), started.clone());
        tokio::spawn(async move {
            serve(listener, app, &coordinator, READ_TIMEOUT, future::pending()).await
        })
    };

    let request = tokio::spawn(reqwest::get(format!("{}/slow", base)));
    started.notified().await;
    assert_eq!(coordinator.state(), ServerLifecycle::Serving);

    shutdown.cancel();

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "done");

    let outcome = server.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Drained);
    assert_eq!(coordinator.state(), ServerLifecycle::Stopped);

    // The listener is closed once drained
    assert!(reqwest::get(format!("{}/slow", base)).await.is_err());
}

#[tokio::test]
async fn test_drain_timeout_closes_stuck_connections() {
    let (listener, base) = bind().await;
    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_millis(300)));
    let started = Arc::new(Notify::new());

    let server = {
        let coordinator = coordinator.clone();
        let app = slow_app(Duration::from_secs(30), started.clone());
        // The termination signal arrives once the request is being handled
        let signal = async move { started.notified().await };
        tokio::spawn(async move {
            serve(listener, app, &coordinator, READ_TIMEOUT, signal).await
        })
    };

    // Never finishes within the drain window
    let stuck = tokio::spawn(reqwest::get(format!("{}/slow", base)));

    let began = Instant::now();
    let outcome = server.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::DrainTimedOut);
    assert!(began.elapsed() < Duration::from_secs(5));
    assert_eq!(coordinator.state(), ServerLifecycle::Stopped);

    // The over-deadline request sees its connection closed instead of a response
    let result = timeout(Duration::from_secs(5), stuck)
        .await
        .expect("stuck request was left running")
        .unwrap();
    assert!(result.is_err(), "request completed: {:?}", result);
}

#[tokio::test]
async fn test_silent_connection_closed_after_read_timeout() {
    let (listener, base) = bind().await;
    let addr = base.trim_start_matches("http://").to_string();
    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(5)));
    let shutdown = coordinator.shutdown_token();

    let server = {
        let coordinator = coordinator.clone();
        let app = slow_app(Duration::ZERO, Arc::new(Notify::new()));
        tokio::spawn(async move {
            serve(
                listener,
                app,
                &coordinator,
                Duration::from_millis(200),
                future::pending(),
            )
            .await
        })
    };

    // Start a request line, then never finish the headers
    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"GET /slow HTTP/1.1\r\n").await.unwrap();

    let mut buf = Vec::new();
    let closed = timeout(Duration::from_secs(3), stream.read_to_end(&mut buf)).await;
    assert!(closed.is_ok(), "connection still open after read timeout");

    shutdown.cancel();
    assert_eq!(server.await.unwrap().unwrap(), ShutdownOutcome::Drained);
}

#[tokio::test]
async fn test_full_app_drains_on_signal() {
    let config = helpers::test_config(&[]);
    let (router, _) = helpers::test_router(&config);
    let (listener, base) = bind().await;
    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(5)));
    let shutdown = coordinator.shutdown_token();

    let server = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            serve(listener, router, &coordinator, READ_TIMEOUT, future::pending()).await
        })
    };

    // Real peer addresses reach the rate limit gate
    let response = reqwest::get(format!("{}/v1/healthcheck", base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
    drop(response);

    shutdown.cancel();
    assert_eq!(server.await.unwrap().unwrap(), ShutdownOutcome::Drained);
}
