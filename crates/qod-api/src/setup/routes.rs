//! Route configuration and setup

use crate::api_doc;
use crate::constants::{API_PREFIX, OPENAPI_JSON_PATH};
use crate::error::{hide_error_details, BodyLimit};
use crate::handlers;
use crate::middleware::{
    get_request_id, panic_recovery_layer, rate_limit_middleware, request_id_middleware,
};
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    routing::get,
    Extension, Json, Router,
};
use qod_core::Config;
use qod_infra::ClientRateLimiter;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes.
///
/// Layers, outermost first: panic recovery, request id, tracing, error detail
/// redaction (production only), CORS, the per-client rate limit gate, the body
/// size limit, then the request timeout.
pub fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
    limiter: Arc<ClientRateLimiter>,
) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;
    let max_body_bytes = config.max_body_bytes();

    let mut app = api_routes()
        .route(
            OPENAPI_JSON_PATH,
            get(|| async { Json(api_doc::get_openapi_spec()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_JSON_PATH).path("/docs"))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(Extension(BodyLimit(max_body_bytes)))
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
        .layer(cors);

    if config.is_production() {
        app = app.layer(axum::middleware::from_fn(hide_error_details));
    }

    let app = app
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = get_request_id(request).unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(panic_recovery_layer())
        .with_state(state);

    Ok(app)
}

fn api_routes() -> Router<Arc<AppState>> {
    use handlers::comments::{
        create_comment, delete_comment, get_comment, list_comments, update_comment,
    };

    let routes = Router::new()
        .route("/healthcheck", get(handlers::health::healthcheck))
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/{id}",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
        .method_not_allowed_fallback(handlers::method_not_allowed);

    Router::new().nest(API_PREFIX, routes)
}

/// Setup CORS configuration. Only the configured trusted origins are allowed;
/// preflight requests are answered by the layer itself.
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let origins = config
        .cors_trusted_origins()
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| anyhow::anyhow!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if origins.is_empty() {
        tracing::debug!("No trusted CORS origins configured");
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}
