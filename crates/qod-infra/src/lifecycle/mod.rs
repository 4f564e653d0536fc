//! Server lifecycle and graceful shutdown
//!
//! [`ShutdownCoordinator`] owns the `Starting -> Serving -> Draining -> Stopped`
//! state machine: it runs the server, waits for a termination signal, drains
//! in-flight requests within a bounded window and reports how it ended.

mod coordinator;
mod signal;

pub use coordinator::{LifecycleError, ServerLifecycle, ShutdownCoordinator, ShutdownOutcome};
pub use signal::shutdown_signal;
