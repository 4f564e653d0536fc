//! QOD Infrastructure Library
//!
//! Shared runtime components used by the API binary:
//! - Per-client rate limiting (token buckets, client registry, idle reaper)
//! - Server lifecycle and graceful shutdown
//! - Middleware (request ID)
//! - Telemetry initialization

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "lifecycle")]
pub mod lifecycle;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{Admission, ClientRateLimiter};

#[cfg(feature = "lifecycle")]
pub use lifecycle::{
    shutdown_signal, LifecycleError, ServerLifecycle, ShutdownCoordinator, ShutdownOutcome,
};
