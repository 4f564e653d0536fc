//! Error types module
//!
//! All request-scoped failures are unified under [`AppError`]. Each variant
//! describes its own HTTP presentation through [`ErrorMetadata`], so the HTTP
//! layer renders every error the same way.

use std::collections::BTreeMap;
use std::time::Duration;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Field name to message, as returned to clients on failed validation.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Edit conflict")]
    EditConflict,

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    #[error("Unable to determine client identity: {0}")]
    IdentityExtraction(String),

    #[error("Recovered from panic: {0}")]
    PanicRecovered(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first().map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    (field.to_string(), message)
                })
            })
            .collect();
        AppError::Validation(fields)
    }
}

/// Static metadata for each variant: (http_status, error_code, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, LogLevel::Error),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, LogLevel::Debug),
        AppError::EditConflict => (409, "EDIT_CONFLICT", false, LogLevel::Debug),
        AppError::MethodNotAllowed(_) => (405, "METHOD_NOT_ALLOWED", false, LogLevel::Debug),
        AppError::Validation(_) => (422, "VALIDATION_FAILED", false, LogLevel::Debug),
        AppError::BadRequest(_) => (400, "BAD_REQUEST", false, LogLevel::Debug),
        AppError::PayloadTooLarge(_) => (413, "PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        AppError::RateLimitExceeded { .. } => {
            (429, "RATE_LIMIT_EXCEEDED", false, LogLevel::Debug)
        }
        AppError::IdentityExtraction(_) => {
            (500, "CLIENT_IDENTITY_UNAVAILABLE", true, LogLevel::Error)
        }
        AppError::PanicRecovered(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::NotFound(_) => "NotFound",
            AppError::EditConflict => "EditConflict",
            AppError::MethodNotAllowed(_) => "MethodNotAllowed",
            AppError::Validation(_) => "Validation",
            AppError::BadRequest(_) => "BadRequest",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::RateLimitExceeded { .. } => "RateLimitExceeded",
            AppError::IdentityExtraction(_) => "IdentityExtraction",
            AppError::PanicRecovered(_) => "PanicRecovered",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    /// Seconds a rejected client should wait before retrying, if applicable.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::RateLimitExceeded { retry_after } => {
                Some(retry_after.as_secs_f64().ceil().max(1.0) as u64)
            }
            _ => None,
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn client_message(&self) -> String {
        match self {
            AppError::NotFound(_) => "the requested resource could not be found".to_string(),
            AppError::EditConflict => {
                "unable to update the record due to an edit conflict, please try again"
                    .to_string()
            }
            AppError::MethodNotAllowed(method) => {
                format!("the {} method is not supported for this resource", method)
            }
            AppError::Validation(_) => "validation failed".to_string(),
            AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::RateLimitExceeded { .. } => "rate limit exceeded".to_string(),
            AppError::Database(_)
            | AppError::IdentityExtraction(_)
            | AppError::PanicRecovered(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => SERVER_ERROR_MESSAGE.to_string(),
        }
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use validator::{ValidationError, ValidationErrors};

    #[test]
    fn test_rate_limit_is_not_logged_as_fault() {
        let err = AppError::RateLimitExceeded {
            retry_after: Duration::from_millis(300),
        };
        assert_eq!(err.http_status_code(), 429);
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.client_message(), "rate limit exceeded");
        assert_eq!(err.retry_after_secs(), Some(1));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = AppError::RateLimitExceeded {
            retry_after: Duration::from_millis(2_100),
        };
        assert_eq!(err.retry_after_secs(), Some(3));

        let err = AppError::RateLimitExceeded {
            retry_after: Duration::MAX,
        };
        assert_eq!(err.retry_after_secs(), Some(u64::MAX));
        assert_eq!(AppError::EditConflict.retry_after_secs(), None);
    }

    #[test]
    fn test_method_not_allowed_names_method() {
        let err = AppError::MethodNotAllowed("DELETE".into());
        assert_eq!(err.http_status_code(), 405);
        assert!(!err.is_sensitive());
        assert_eq!(
            err.client_message(),
            "the DELETE method is not supported for this resource"
        );
    }

    #[test]
    fn test_server_faults_hide_details() {
        for err in [
            AppError::IdentityExtraction("no peer address".into()),
            AppError::PanicRecovered("boom".into()),
            AppError::Internal("oops".into()),
        ] {
            assert_eq!(err.http_status_code(), 500);
            assert!(err.is_sensitive());
            assert_eq!(err.log_level(), LogLevel::Error);
            assert!(!err.client_message().contains("boom"));
        }
    }

    #[test]
    fn test_validation_errors_converted_to_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "content",
            ValidationError::new("required").with_message(Cow::Borrowed("must be provided")),
        );
        errors.add("author", ValidationError::new("length"));

        let AppError::Validation(fields) = AppError::from(errors) else {
            panic!("expected validation error");
        };
        assert_eq!(fields.get("content").map(String::as_str), Some("must be provided"));
        assert_eq!(fields.get("author").map(String::as_str), Some("length"));
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.http_status_code(), 404);
    }
}
