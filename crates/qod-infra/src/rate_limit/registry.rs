use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::bucket::ClientState;

/// Map from client identity to its admission-control state.
///
/// Every access goes through a single mutex, and each method holds it only for
/// the lookup/insert/update it performs. Callers never get a reference that
/// outlives the lock: per-client work runs inside [`ClientRegistry::with_client`].
///
/// Entries are created lazily on first contact and removed only by
/// [`ClientRegistry::evict_if_idle`] (the reaper), never during a request.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientState>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the entry for `identity`, mark it seen at `now`, and run
    /// `f` on it, all in one critical section.
    ///
    /// New entries start with `capacity` tokens. `f` must be short and must not
    /// block: it runs with the registry lock held.
    pub async fn with_client<R>(
        &self,
        identity: &str,
        capacity: f64,
        now: Instant,
        f: impl FnOnce(&mut ClientState) -> R,
    ) -> R {
        let mut clients = self.clients.lock().await;
        let state = match clients.get_mut(identity) {
            Some(state) => state,
            None => clients
                .entry(identity.to_string())
                .or_insert_with(|| ClientState::new(capacity, now)),
        };
        state.touch(now);
        f(state)
    }

    /// Identities registered at the moment of the call.
    pub async fn snapshot_identities(&self) -> Vec<String> {
        self.clients.lock().await.keys().cloned().collect()
    }

    /// Remove `identity` if it has gone unseen for longer than `threshold`.
    ///
    /// The idle check reads the entry under the same lock that removes it, so a
    /// request that touches the entry concurrently is never lost.
    pub async fn evict_if_idle(&self, identity: &str, now: Instant, threshold: Duration) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.get(identity) {
            Some(state) if state.idle_for(now) > threshold => {
                clients.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Copy of the current state for `identity`, if registered.
    pub async fn get(&self, identity: &str) -> Option<ClientState> {
        self.clients.lock().await.get(identity).cloned()
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.clients.lock().await.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}
