//! Per-client rate limiting
//!
//! Token buckets keyed by client identity, a shared registry holding them, and
//! a background reaper that evicts clients that have gone quiet.

pub use bucket::{Admission, ClientState, TokenBucket};
pub use limiter::ClientRateLimiter;
pub use reaper::IdleReaper;
pub use registry::ClientRegistry;

mod bucket;
mod limiter;
mod reaper;
mod registry;
