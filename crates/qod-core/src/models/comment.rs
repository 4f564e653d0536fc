use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub const CONTENT_MAX_BYTES: usize = 100;
pub const AUTHOR_MAX_BYTES: usize = 25;

/// A stored comment
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, Validate)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Comment {
    pub id: i64,
    #[validate(custom(function = "validate_content"))]
    pub content: String,
    #[validate(custom(function = "validate_author"))]
    pub author: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    /// Incremented on every update; used for optimistic concurrency
    pub version: i32,
}

/// A comment that has not been persisted yet
#[derive(Debug, Clone, Validate)]
pub struct NewComment {
    #[validate(custom(function = "validate_content"))]
    pub content: String,
    #[validate(custom(function = "validate_author"))]
    pub author: String,
}

/// Request DTO for creating a comment.
///
/// Missing fields decode as empty strings so they are reported by validation
/// rather than as a decoding failure.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
}

impl From<CreateCommentRequest> for NewComment {
    fn from(request: CreateCommentRequest) -> Self {
        NewComment {
            content: request.content,
            author: request.author,
        }
    }
}

/// Request DTO for a partial update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

impl UpdateCommentRequest {
    pub fn apply_to(self, comment: &mut Comment) {
        if let Some(content) = self.content {
            comment.content = content;
        }
        if let Some(author) = self.author {
            comment.author = author;
        }
    }
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
    validate_text(content, CONTENT_MAX_BYTES)
}

fn validate_author(author: &str) -> Result<(), ValidationError> {
    validate_text(author, AUTHOR_MAX_BYTES)
}

// Limits are in bytes, not characters.
fn validate_text(value: &str, max_bytes: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("must be provided")));
    }
    if value.len() > max_bytes {
        return Err(ValidationError::new("length").with_message(Cow::Owned(format!(
            "must not be more than {} bytes long",
            max_bytes
        ))));
    }
    Ok(())
}
