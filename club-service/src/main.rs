use club_service::{
    build_router,
    config::ClubConfig,
    services::{GoogleOAuthClient, LocalStorage, MongoDb},
    AppState, Backends,
};
use service_core::error::AppError;
use service_core::observability::{init_tracing, shutdown_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ClubConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting club service"
    );

    tracing::info!("Initializing database connection");
    let db = MongoDb::connect(&config.mongodb)
        .await
        .map_err(AppError::DatabaseError)?;
    db.initialize_indexes().await?;
    tracing::info!("Database initialized successfully");

    let storage = LocalStorage::new(&config.storage.local_path)
        .await
        .map_err(AppError::ConfigError)?;
    let provider =
        GoogleOAuthClient::new(config.google.clone()).map_err(AppError::ConfigError)?;

    let db = Arc::new(db);
    let state = AppState::new(
        config.clone(),
        Backends {
            accounts: db.clone(),
            events: db.clone(),
            attachments: db,
            storage: Arc::new(storage),
            provider: Arc::new(provider),
        },
    )?;
    tracing::info!("Services and rate limiters initialized");

    let app = build_router(state);

    let addr: SocketAddr = config.common.bind_address().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e))
    })?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    shutdown_tracing();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
