use txscope::adapter::config::AppConfig;
use txscope::adapter::init::AppInitializer;
use txscope::adapter::web::create_router::create_router;
use txscope::error::ApplicationError;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    tracing_subscriber::fmt().init();

    let config = AppConfig::load();
    let state = AppInitializer::initialize(&config)
        .await
        .map_err(|e| ApplicationError::InitializationError(e.to_string()))?;

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .map_err(|e| ApplicationError::ServerError(e.to_string()))?;
    tracing::info!(addr = config.bind_addr(), "server listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| ApplicationError::ServerError(e.to_string()))?;

    Ok(())
}
