use axum::{
    extract::rejection::ExtensionRejection,
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use qod_core::AppError;
use qod_infra::{Admission, ClientRateLimiter};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::HttpAppError;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// Per-client admission gate.
///
/// Clients are identified by peer IP. Requests over budget are answered with
/// 429 and `Retry-After` and never reach the handler. The registry lock is
/// released before the request is forwarded.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    // Without a peer address there is nothing to key on; that is a wiring fault.
    let identity = match connect_info {
        Ok(ConnectInfo(addr)) => addr.ip().to_string(),
        Err(rejection) => {
            return HttpAppError(AppError::IdentityExtraction(rejection.body_text()))
                .into_response();
        }
    };

    match limiter.check(&identity).await {
        Admission::Admitted { remaining } => {
            let mut response = next.run(request).await;
            set_limit_headers(&mut response, limiter.burst(), remaining);
            response
        }
        Admission::Rejected { retry_after } => {
            tracing::debug!(
                client = %identity,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            let mut response =
                HttpAppError(AppError::RateLimitExceeded { retry_after }).into_response();
            set_limit_headers(&mut response, limiter.burst(), 0);
            response
        }
    }
}

fn set_limit_headers(response: &mut Response, limit: u32, remaining: u32) {
    if let Ok(header_value) = HeaderValue::from_str(&limit.to_string()) {
        response.headers_mut().insert(LIMIT_HEADER, header_value);
    }
    if let Ok(header_value) = HeaderValue::from_str(&remaining.to_string()) {
        response.headers_mut().insert(REMAINING_HEADER, header_value);
    }
}
