use qod_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, database, routes)
    let app = qod_api::setup::initialize_app(config.clone()).await?;

    // Serve until a termination signal, then drain
    if let Err(e) = qod_api::setup::server::start_server(&config, app.router, app.limiter).await {
        tracing::error!(error = %e, "Server exited with an error");
        qod_infra::shutdown_telemetry().await;
        return Err(e);
    }

    qod_infra::shutdown_telemetry().await;
    Ok(())
}
