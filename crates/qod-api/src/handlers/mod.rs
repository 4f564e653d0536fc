pub mod comments;
pub mod health;

use crate::error::HttpAppError;
use axum::http::Method;
use qod_core::AppError;

/// Fallback for unmatched routes
pub async fn not_found() -> HttpAppError {
    HttpAppError(AppError::NotFound("route".to_string()))
}

/// Fallback for known routes hit with an unsupported method
pub async fn method_not_allowed(method: Method) -> HttpAppError {
    HttpAppError(AppError::MethodNotAllowed(method.to_string()))
}
