pub mod rate_limit;
pub mod recover;

pub use qod_infra::{get_request_id, request_id_middleware};
pub use rate_limit::rate_limit_middleware;
pub use recover::panic_recovery_layer;
