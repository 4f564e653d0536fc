use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Process-wide server state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerLifecycle {
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl fmt::Display for ServerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerLifecycle::Starting => "starting",
            ServerLifecycle::Serving => "serving",
            ServerLifecycle::Draining => "draining",
            ServerLifecycle::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How a shutdown that was not caused by a server fault ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished within the drain window.
    Drained,
    /// The drain window elapsed first; remaining work was abandoned.
    DrainTimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to bind listener: {0}")]
    Listen(#[source] io::Error),

    #[error("server failed: {0}")]
    Serve(#[source] io::Error),

    #[error("server task failed: {0}")]
    ServerTask(#[from] JoinError),

    #[error("server stopped without a shutdown request")]
    UnexpectedClose,
}

/// Runs a server until a termination signal arrives, then drains it within
/// `drain_timeout`.
///
/// The coordinator is the only writer of [`ServerLifecycle`]; observers
/// follow it through [`ShutdownCoordinator::subscribe`]. Background tasks that
/// must stop with the server should use [`ShutdownCoordinator::child_token`].
#[derive(Debug)]
pub struct ShutdownCoordinator {
    drain_timeout: Duration,
    shutdown: CancellationToken,
    state: watch::Sender<ServerLifecycle>,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ServerLifecycle::Starting);
        Self {
            drain_timeout,
            shutdown: CancellationToken::new(),
            state,
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn state(&self) -> ServerLifecycle {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerLifecycle> {
        self.state.subscribe()
    }

    /// Cancelling this token starts the drain, same as a termination signal.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Token cancelled once the server starts draining or stops.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    fn transition(&self, next: ServerLifecycle) {
        let advanced = self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
        if advanced {
            tracing::info!(state = %next, "Server lifecycle transition");
        }
    }

    /// Serve until `signal` resolves or the shutdown token is cancelled, then
    /// drain.
    ///
    /// `serve` receives a token that is cancelled when draining begins; the
    /// future it returns must stop accepting work at that point and resolve
    /// once in-flight requests are done. If the drain window elapses first the
    /// future is dropped, so it must own its connection tasks (e.g. in a
    /// `JoinSet`) for those to be cut off too. A server that ends on its own
    /// before any shutdown request is always an error, even if it returned `Ok`.
    pub async fn run<F, Fut, S>(
        &self,
        serve: F,
        signal: S,
    ) -> Result<ShutdownOutcome, LifecycleError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = io::Result<()>> + Send + 'static,
        S: Future<Output = ()>,
    {
        let graceful = CancellationToken::new();
        let mut server = tokio::spawn(serve(graceful.clone()));
        self.transition(ServerLifecycle::Serving);

        tokio::select! {
            result = &mut server => {
                self.transition(ServerLifecycle::Stopped);
                self.shutdown.cancel();
                let err = match result {
                    Ok(Ok(())) => LifecycleError::UnexpectedClose,
                    Ok(Err(e)) => LifecycleError::Serve(e),
                    Err(e) => LifecycleError::ServerTask(e),
                };
                tracing::error!(error = %err, "Server stopped unexpectedly");
                return Err(err);
            }
            _ = signal => {
                tracing::info!("Termination signal received");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("Shutdown requested");
            }
        }

        self.transition(ServerLifecycle::Draining);
        self.shutdown.cancel();
        graceful.cancel();

        let outcome = match tokio::time::timeout(self.drain_timeout, &mut server).await {
            Ok(Ok(Ok(()))) => Ok(ShutdownOutcome::Drained),
            Ok(Ok(Err(e))) => Err(LifecycleError::Serve(e)),
            Ok(Err(e)) => Err(LifecycleError::ServerTask(e)),
            Err(_) => {
                server.abort();
                // Wait for the serve future to be dropped, closing what it owns
                let _ = (&mut server).await;
                tracing::warn!(
                    drain_timeout_secs = self.drain_timeout.as_secs_f64(),
                    "Drain timeout elapsed with requests still in flight"
                );
                Ok(ShutdownOutcome::DrainTimedOut)
            }
        };

        self.transition(ServerLifecycle::Stopped);
        match &outcome {
            Ok(result) => tracing::info!(outcome = ?result, "Server stopped"),
            Err(e) => tracing::error!(error = %e, "Server failed while draining"),
        }
        outcome
    }
}
