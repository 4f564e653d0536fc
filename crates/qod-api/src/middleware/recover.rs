use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use qod_core::AppError;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::HttpAppError;

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Outermost layer: turns a handler panic into a 500 and keeps serving.
pub fn panic_recovery_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    // Logged at error level by HttpAppError
    let mut response = HttpAppError(AppError::PanicRecovered(message)).into_response();

    // Response state may be inconsistent; do not reuse the connection.
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
