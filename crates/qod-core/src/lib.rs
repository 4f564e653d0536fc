//! QOD Core Library
//!
//! This crate provides configuration, error types, domain models and validation
//! that are shared across all QOD components.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, DatabaseConfig, RateLimitConfig};
pub use error::{AppError, ErrorMetadata, FieldErrors, LogLevel};
