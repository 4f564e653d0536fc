//! API constants

/// Versioned prefix for every resource route
pub const API_PREFIX: &str = "/v1";

/// Application version reported by the healthcheck
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path of the generated OpenAPI document
pub const OPENAPI_JSON_PATH: &str = "/api/openapi.json";
