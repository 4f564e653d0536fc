use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::registry::ClientRegistry;

/// Background task that keeps the client registry bounded.
///
/// Every `interval` it evicts entries unseen for longer than `threshold`. A
/// client that comes back after eviction starts again with a full bucket.
#[derive(Debug, Clone)]
pub struct IdleReaper {
    registry: Arc<ClientRegistry>,
    interval: Duration,
    threshold: Duration,
}

impl IdleReaper {
    pub fn new(registry: Arc<ClientRegistry>, interval: Duration, threshold: Duration) -> Self {
        Self {
            registry,
            interval,
            threshold,
        }
    }

    /// Run a single pass at `now`, returning how many entries were evicted.
    ///
    /// The identity set is captured first; each idle check then re-reads its
    /// entry under the lock, so the lock is never held across the whole scan.
    pub async fn reap_once(&self, now: Instant) -> usize {
        let identities = self.registry.snapshot_identities().await;
        let scanned = identities.len();

        let mut evicted = 0;
        for identity in identities {
            if self.registry.evict_if_idle(&identity, now, self.threshold).await {
                evicted += 1;
            }
        }

        tracing::debug!(scanned, evicted, "Idle client reaper pass complete");
        evicted
    }

    /// Spawn the periodic reaper. It stops at the next tick boundary once
    /// `cancel_token` is cancelled.
    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::spawn(async move {
            tracing::debug!(
                interval_secs = self.interval.as_secs(),
                threshold_secs = self.threshold.as_secs(),
                "Idle client reaper started"
            );
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        self.reap_once(Instant::now()).await;
                    }
                }
            }
            tracing::debug!("Idle client reaper stopped");
        })
    }
}
