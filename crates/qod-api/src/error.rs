//! HTTP error response conversion
//!
//! This module provides HTTP-specific error response conversion for AppError.
//!
//! **Preferred handler pattern:** Return `Result<impl IntoResponse, HttpAppError>`. Use
//! `AppError` for errors and `?` so they become `HttpAppError` and render
//! consistently (status, body, logging).

use axum::{
    body::Bytes,
    extract::rejection::{BytesRejection, PathRejection, QueryRejection},
    extract::{FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use qod_core::{AppError, ErrorMetadata, FieldErrors, LogLevel};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::error::Category;
use utoipa::ToSchema;

/// Error message, or a field-to-message map for failed validation.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(FieldErrors),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from qod-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        HttpAppError(AppError::from(errors))
    }
}

impl From<PathRejection> for HttpAppError {
    fn from(_: PathRejection) -> Self {
        HttpAppError(AppError::NotFound("invalid id parameter".to_string()))
    }
}

impl From<QueryRejection> for HttpAppError {
    fn from(rejection: QueryRejection) -> Self {
        HttpAppError(AppError::BadRequest(rejection.body_text()))
    }
}

/// Upper bound on request body size, published to extractors as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// JSON body extractor with plain-English 400s for malformed input.
///
/// Accepts exactly one JSON value, rejects unknown keys when the target type
/// denies them, and reports oversized bodies as 413.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let limit = req.extensions().get::<BodyLimit>().map(|limit| limit.0);
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| body_rejection(rejection, limit))?;

        decode_json(&bytes).map(ValidatedJson).map_err(HttpAppError)
    }
}

fn body_rejection(rejection: BytesRejection, limit: Option<usize>) -> HttpAppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let message = match limit {
            Some(limit) => format!("body must not be larger than {} bytes", limit),
            None => "body is too large".to_string(),
        };
        return HttpAppError(AppError::PayloadTooLarge(message));
    }
    HttpAppError(AppError::BadRequest(rejection.body_text()))
}

/// Decode a single JSON value, translating serde errors into client-facing messages.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::BadRequest("body must not be empty".to_string()));
    }

    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut deserializer).map_err(json_error)?;
    deserializer.end().map_err(|_| {
        AppError::BadRequest("body must only contain a single JSON value".to_string())
    })?;
    Ok(value)
}

fn json_error(err: serde_json::Error) -> AppError {
    let message = match err.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {}, column {})",
            err.line(),
            err.column()
        ),
        Category::Data => {
            let text = err.to_string();
            if let Some(key) = unknown_field(&text) {
                format!("body contains unknown key \"{}\"", key)
            } else if text.starts_with("invalid type") {
                format!(
                    "body contains incorrect JSON type (at line {}, column {})",
                    err.line(),
                    err.column()
                )
            } else {
                format!("body contains invalid JSON: {}", text)
            }
        }
        Category::Io => return AppError::Internal(err.to_string()),
    };
    AppError::BadRequest(message)
}

fn unknown_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("unknown field `")?;
    rest.split('`').next()
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error,
                error_type = error_type,
                details = %error.detailed_message(),
                "Error occurred"
            );
        }
    }
}

/// Detail-free copy of an error body, carried on the response so
/// [`hide_error_details`] can swap it in.
#[derive(Debug, Clone)]
struct RedactedBody(ErrorResponse);

/// Replace error bodies with their detail-free form. Installed in production.
pub async fn hide_error_details(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<RedactedBody>() {
        Some(RedactedBody(body)) => {
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Json(body).into_response().into_body())
        }
        None => response,
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let error = match app_error {
            AppError::Validation(fields) => ErrorMessage::Fields(fields.clone()),
            other => ErrorMessage::Text(other.client_message()),
        };

        let redacted = ErrorResponse {
            error,
            details: None,
            error_type: None,
            code: app_error.error_code().to_string(),
        };

        // Sensitive errors never carry details
        let mut response = if app_error.is_sensitive() {
            (status, Json(redacted)).into_response()
        } else {
            let body = ErrorResponse {
                details: Some(app_error.detailed_message()),
                error_type: Some(app_error.error_type().to_string()),
                ..redacted.clone()
            };
            let mut response = (status, Json(body)).into_response();
            response.extensions_mut().insert(RedactedBody(redacted));
            response
        };
        if let Some(seconds) = app_error.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Plain confirmation body, e.g. after a delete
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
