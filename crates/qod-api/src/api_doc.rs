//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use qod_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "QOD Comments API",
        version = "0.1.0",
        description = "CRUD over comments with full-text filtering and pagination. Every client is rate limited per peer address; rejected requests get 429 with Retry-After. All endpoints are versioned under /v1/."
    ),
    paths(
        handlers::health::healthcheck,
        handlers::comments::create_comment,
        handlers::comments::get_comment,
        handlers::comments::update_comment,
        handlers::comments::delete_comment,
        handlers::comments::list_comments,
    ),
    components(
        schemas(
            models::Comment,
            models::CreateCommentRequest,
            models::UpdateCommentRequest,
            models::PaginationMetadata,
            handlers::comments::CommentEnvelope,
            handlers::comments::CommentListResponse,
            handlers::health::HealthResponse,
            handlers::health::SystemInfo,
            error::ErrorResponse,
            error::ErrorMessage,
            error::MessageResponse,
        )
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "comments", description = "Comment management")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_every_comment_route() {
        let spec = get_openapi_spec();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for expected in ["/v1/healthcheck", "/v1/comments", "/v1/comments/{id}"] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {} in {:?}",
                expected,
                paths
            );
        }
    }
}
