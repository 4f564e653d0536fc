//! Application setup and initialization
//!
//! Everything main.rs needs to go from a loaded [`Config`] to a running server.

pub mod database;
pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use qod_core::Config;
use qod_db::CommentRepository;
use qod_infra::ClientRateLimiter;
use std::sync::Arc;

/// Initialized application: shared state, the rate limiter whose reaper the
/// server runs, and the fully layered router.
pub struct App {
    pub state: Arc<AppState>,
    pub limiter: Arc<ClientRateLimiter>,
    pub router: axum::Router,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    qod_infra::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;

    let comments = CommentRepository::new(pool, config.database.query_timeout);
    let limiter = Arc::new(ClientRateLimiter::new(config.rate_limit().clone()));
    let state = Arc::new(AppState::new(config.clone(), comments));

    let router = routes::setup_routes(&config, state.clone(), limiter.clone())?;

    Ok(App {
        state,
        limiter,
        router,
    })
}
