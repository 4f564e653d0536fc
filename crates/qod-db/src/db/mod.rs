//! Database repositories for data access layer
//!
//! Every query is bounded by the repository's query timeout.

pub mod comment;

pub use comment::CommentRepository;

use qod_core::AppError;
use std::future::Future;
use std::time::Duration;

/// Run a query future, failing with an internal error if it exceeds `limit`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, query: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, query).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Internal(format!(
            "database query exceeded {}s timeout",
            limit.as_secs_f64()
        ))),
    }
}
