//! Server startup and graceful shutdown

use anyhow::Result;
use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use qod_core::Config;
use qod_infra::{
    shutdown_signal, ClientRateLimiter, LifecycleError, ShutdownCoordinator, ShutdownOutcome,
};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Bind the listener and serve until a termination signal, then drain.
///
/// The idle client reaper runs alongside the server and stops when draining
/// begins.
pub async fn start_server(
    config: &Config,
    app: Router,
    limiter: Arc<ClientRateLimiter>,
) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(LifecycleError::Listen)?;

    let coordinator = ShutdownCoordinator::new(config.drain_timeout());
    let reaper = limiter
        .is_enabled()
        .then(|| limiter.spawn_reaper(coordinator.child_token()));

    let limits = limiter.config();
    tracing::info!(
        environment = config.environment(),
        limiter_enabled = limits.enabled,
        limiter_rps = limits.requests_per_second,
        limiter_burst = limits.burst,
        drain_timeout_secs = config.drain_timeout().as_secs(),
        read_timeout_secs = config.read_timeout().as_secs(),
        "Server ready and accepting connections"
    );

    let outcome = serve(
        listener,
        app,
        &coordinator,
        config.read_timeout(),
        shutdown_signal(),
    )
    .await;

    if let Some(reaper) = reaper {
        if let Err(e) = reaper.await {
            tracing::warn!(error = %e, "Idle client reaper ended abnormally");
        }
    }

    match outcome? {
        ShutdownOutcome::Drained => tracing::info!("Shutdown complete"),
        ShutdownOutcome::DrainTimedOut => {
            tracing::warn!("Shutdown complete; some requests were cut off")
        }
    }
    Ok(())
}

/// Run `app` on `listener` under `coordinator` until `signal` resolves or the
/// coordinator's shutdown token is cancelled.
///
/// Clients get `read_timeout` to send each request's headers, counted from the
/// moment the connection opens or the previous response ends. Requests carry
/// their peer address so the rate limit gate can identify clients. When the
/// drain window elapses, every connection still open is closed.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    coordinator: &ShutdownCoordinator,
    read_timeout: Duration,
    signal: S,
) -> Result<ShutdownOutcome, LifecycleError>
where
    S: Future<Output = ()>,
{
    coordinator
        .run(
            move |graceful| accept_connections(listener, app, read_timeout, graceful),
            signal,
        )
        .await
}

/// Accept until `graceful` is cancelled, then wait for open connections to
/// finish their in-flight requests.
///
/// Connection tasks live in a `JoinSet` owned by this future; dropping the
/// future aborts all of them.
async fn accept_connections(
    listener: TcpListener,
    app: Router,
    read_timeout: Duration,
    graceful: CancellationToken,
) -> io::Result<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = graceful.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        app.clone(),
                        read_timeout,
                        graceful.clone(),
                    ));
                }
                Err(e) if is_connection_error(&e) => {}
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning
                    tracing::error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "Connection task failed");
                }
            }
        }
    }

    drop(listener);
    tracing::debug!(
        open_connections = connections.len(),
        "Listener closed, waiting for open connections"
    );
    while connections.join_next().await.is_some() {}
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    read_timeout: Duration,
    graceful: CancellationToken,
) {
    let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request)
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
                }
                break;
            }
            _ = graceful.cancelled(), if !draining => {
                // Finish the in-flight request, then close
                connection.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
