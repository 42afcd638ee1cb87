use std::panic;
use std::process;
use std::sync::Arc;
use colabri_sync::{
    build_router,
    clients::{app_service_client::AppServiceClient, file_service::AppFileService, FileService},
    config::{Config, ConfigError},
    services::auth_service::JwtAuthenticator,
    ws::gateway::{Gateway, GatewaySettings},
    AppState,
};
use tracing::{info, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main(flavor = "current_thread")]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration before tracing so LOG_LEVEL can seed the filter
    let config = Config::load().and_then(|config| config.validate().map(|_| config));

    // Initialize tracing
    let fallback_level = config.as_ref().map(|c| c.log_level.clone()).unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("colabri_sync=debug,tower_http=debug,axum::rejection=trace,{}", fallback_level).into()
        }))
        .init();

    info!("Starting server...");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let gateway = match build_gateway(&config) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("Failed to initialize collaborators: {}", e);
            process::exit(1);
        }
    };

    let state = Arc::new(AppState { config: config.clone(), gateway: gateway.clone() });
    let app_routes = build_router(state);

    // Start the HTTP/WebSocket server
    let listener = match tokio::net::TcpListener::bind(config.server_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.server_address(), e);
            process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    if let Err(e) = axum::serve(listener, app_routes)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    // Nothing dirty may be lost on the way out
    gateway.shutdown().await;
    info!("Server stopped");
}

fn build_gateway(config: &Config) -> Result<Gateway, Box<dyn std::error::Error>> {
    let secret = config
        .cloud_auth_jwt_secret
        .clone()
        .ok_or(ConfigError::Missing("CLOUD_AUTH_JWT_SECRET"))?;
    let app_service_url = config
        .app_service_url
        .clone()
        .ok_or(ConfigError::Missing("APP_SERVICE_URL"))?;

    let app_client = Arc::new(AppServiceClient::new(
        app_service_url,
        secret.clone(),
        config.cloud_service_name.clone(),
        std::time::Duration::from_secs(config.app_service_timeout_secs),
    )?);
    let files: Arc<dyn FileService> = Arc::new(AppFileService::new(app_client.clone(), config.storage_root.clone()));
    let authenticator = Arc::new(JwtAuthenticator::new(secret));

    Ok(Gateway::from_settings(authenticator, app_client, files, GatewaySettings::from(config)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, flushing documents");
}
