//! Comment handlers
//!
//! CRUD over comments plus a filtered, paginated listing.

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use qod_core::models::{
    Comment, CreateCommentRequest, Filters, NewComment, PaginationMetadata, UpdateCommentRequest,
};
use qod_core::{AppError, FieldErrors};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::constants::API_PREFIX;
use crate::error::{HttpAppError, MessageResponse, ValidatedJson};
use crate::state::AppState;

/// Clients may send the version they last read; a mismatch is an edit conflict.
pub const EXPECTED_VERSION_HEADER: &str = "X-Expected-Version";

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentEnvelope {
    pub comment: Comment,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
    #[serde(rename = "@metadata")]
    pub metadata: PaginationMetadata,
}

/// Query string for the comment listing. Numbers arrive as text so that a
/// malformed value is reported per field instead of failing the whole query.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCommentsQuery {
    /// Full-text filter on the comment content
    pub content: Option<String>,
    /// Full-text filter on the author
    pub author: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    /// One of id, content, author; prefix with `-` for descending
    pub sort: Option<String>,
}

impl ListCommentsQuery {
    fn into_parts(self) -> Result<(String, String, Filters), AppError> {
        let defaults = Filters::default();
        let mut errors = FieldErrors::new();

        let page = parse_int(self.page.as_deref(), "page", defaults.page, &mut errors);
        let page_size = parse_int(
            self.page_size.as_deref(),
            "page_size",
            defaults.page_size,
            &mut errors,
        );

        let filters = Filters {
            page,
            page_size,
            sort: self.sort.unwrap_or(defaults.sort),
        };

        if let Err(validation) = filters.validate() {
            if let AppError::Validation(fields) = AppError::from(validation) {
                for (field, message) in fields {
                    errors.entry(field).or_insert(message);
                }
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok((
            self.content.unwrap_or_default(),
            self.author.unwrap_or_default(),
            filters,
        ))
    }
}

fn parse_int(raw: Option<&str>, field: &str, default: u32, errors: &mut FieldErrors) -> u32 {
    match raw {
        None | Some("") => default,
        Some(raw) => match raw.parse::<i64>() {
            // Out-of-range values are clamped so range validation reports them
            Ok(value) => value.clamp(0, i64::from(u32::MAX)) as u32,
            Err(_) => {
                errors.insert(field.to_string(), "must be an integer value".to_string());
                default
            }
        },
    }
}

fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, AppError> {
    match headers.get(EXPECTED_VERSION_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .map(Some)
            .ok_or_else(|| {
                AppError::BadRequest(format!("{} must be an integer", EXPECTED_VERSION_HEADER))
            }),
    }
}

/// Create a new comment
#[utoipa::path(
    post,
    path = "/v1/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentEnvelope,
            headers(("Location" = String, description = "URL of the new comment"))),
        (status = 400, description = "Malformed JSON body"),
        (status = 413, description = "Body too large"),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Internal server error")
    ),
    tag = "comments"
)]
#[tracing::instrument(skip(state, request))]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let comment = NewComment::from(request);
    comment.validate()?;

    let comment = state.comments.insert(&comment).await?;
    tracing::info!(comment_id = comment.id, "Comment created");

    let location = format!("{}/comments/{}", API_PREFIX, comment.id);
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(header::LOCATION, value);
    }

    Ok((StatusCode::CREATED, headers, Json(CommentEnvelope { comment })))
}

/// Get a comment by ID
#[utoipa::path(
    get,
    path = "/v1/comments/{id}",
    params(
        ("id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Comment found", body = CommentEnvelope),
        (status = 404, description = "Comment not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "comments"
)]
#[tracing::instrument(skip(state, id))]
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Path(id) = id?;
    let comment = state.comments.get(id).await?;
    Ok(Json(CommentEnvelope { comment }))
}

/// Partially update a comment
///
/// Only the fields present in the body are changed. The write is rejected
/// with 409 if the comment changed since it was read.
#[utoipa::path(
    patch,
    path = "/v1/comments/{id}",
    params(
        ("id" = i64, Path, description = "Comment ID"),
        ("X-Expected-Version" = Option<i32>, Header, description = "Version the client last read")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentEnvelope),
        (status = 400, description = "Malformed JSON body"),
        (status = 404, description = "Comment not found"),
        (status = 409, description = "Edit conflict"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "comments"
)]
#[tracing::instrument(skip(state, id, headers, request))]
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<UpdateCommentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Path(id) = id?;
    let expected = expected_version(&headers)?;

    let mut comment = state.comments.get(id).await?;
    if let Some(expected) = expected {
        if expected != comment.version {
            return Err(AppError::EditConflict.into());
        }
    }

    request.apply_to(&mut comment);
    comment.validate()?;

    let comment = state.comments.update(&comment).await?;
    tracing::info!(comment_id = comment.id, version = comment.version, "Comment updated");
    Ok(Json(CommentEnvelope { comment }))
}

/// Delete a comment
#[utoipa::path(
    delete,
    path = "/v1/comments/{id}",
    params(
        ("id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Comment deleted", body = MessageResponse),
        (status = 404, description = "Comment not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "comments"
)]
#[tracing::instrument(skip(state, id))]
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Path(id) = id?;
    state.comments.delete(id).await?;
    tracing::info!(comment_id = id, "Comment deleted");
    Ok(Json(MessageResponse {
        message: "comment successfully deleted".to_string(),
    }))
}

/// List comments with full-text filters, sorting and pagination
#[utoipa::path(
    get,
    path = "/v1/comments",
    params(ListCommentsQuery),
    responses(
        (status = 200, description = "Page of comments", body = CommentListResponse),
        (status = 422, description = "Invalid filters"),
        (status = 500, description = "Internal server error")
    ),
    tag = "comments"
)]
#[tracing::instrument(skip(state, query))]
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListCommentsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Query(query) = query?;
    let (content, author, filters) = query.into_parts()?;

    let (comments, metadata) = state.comments.list(&content, &author, &filters).await?;
    Ok(Json(CommentListResponse { comments, metadata }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, page_size: Option<&str>, sort: Option<&str>) -> ListCommentsQuery {
        ListCommentsQuery {
            page: page.map(String::from),
            page_size: page_size.map(String::from),
            sort: sort.map(String::from),
            ..ListCommentsQuery::default()
        }
    }

    #[test]
    fn test_defaults_when_query_empty() {
        let (content, author, filters) = ListCommentsQuery::default().into_parts().unwrap();
        assert!(content.is_empty());
        assert!(author.is_empty());
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn test_non_integer_page_reported_per_field() {
        let err = query(Some("two"), Some("0"), Some("-author"))
            .into_parts()
            .unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields["page"], "must be an integer value");
        assert!(fields.contains_key("page_size"));
        assert!(!fields.contains_key("sort"));
    }

    #[test]
    fn test_bad_sort_and_negative_page_rejected() {
        let AppError::Validation(fields) = query(Some("-1"), None, Some("created_at"))
            .into_parts()
            .unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("page"));
        assert_eq!(fields["sort"], "invalid sort value");
    }

    #[test]
    fn test_expected_version_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(expected_version(&headers).unwrap(), None);

        headers.insert(EXPECTED_VERSION_HEADER, HeaderValue::from_static("3"));
        assert_eq!(expected_version(&headers).unwrap(), Some(3));

        headers.insert(EXPECTED_VERSION_HEADER, HeaderValue::from_static("three"));
        assert!(matches!(
            expected_version(&headers),
            Err(AppError::BadRequest(_))
        ));
    }
}
