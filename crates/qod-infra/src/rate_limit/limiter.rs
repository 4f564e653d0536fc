use qod_core::RateLimitConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::bucket::{Admission, TokenBucket};
use super::reaper::IdleReaper;
use super::registry::ClientRegistry;

/// Per-client admission control: one token bucket per identity, held in a
/// shared [`ClientRegistry`].
///
/// Cheap to share behind an `Arc`; every request handler and the idle reaper
/// see the same registry.
#[derive(Debug)]
pub struct ClientRateLimiter {
    config: RateLimitConfig,
    bucket: TokenBucket,
    registry: Arc<ClientRegistry>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = TokenBucket::new(f64::from(config.burst), config.requests_per_second);
        Self {
            config,
            bucket,
            registry: Arc::new(ClientRegistry::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn burst(&self) -> u32 {
        self.config.burst
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Try to admit one request from `identity` at the current instant.
    ///
    /// Lookup, refill and consumption happen in a single registry critical
    /// section; nothing downstream of the decision runs under the lock.
    #[tracing::instrument(skip(self))]
    pub async fn check(&self, identity: &str) -> Admission {
        let now = Instant::now();
        let bucket = self.bucket;
        let admission = self
            .registry
            .with_client(identity, bucket.capacity(), now, |state| {
                bucket.try_consume(state, now)
            })
            .await;

        match admission {
            Admission::Admitted { remaining } => {
                tracing::trace!(remaining, "Request admitted");
            }
            Admission::Rejected { retry_after } => {
                tracing::debug!(
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit reached for client"
                );
            }
        }

        admission
    }

    /// Start the idle reaper over this limiter's registry.
    pub fn spawn_reaper(&self, cancel_token: CancellationToken) -> JoinHandle<()> {
        IdleReaper::new(
            self.registry.clone(),
            self.config.reaper_interval,
            self.config.idle_eviction_threshold,
        )
        .spawn(cancel_token)
    }
}
