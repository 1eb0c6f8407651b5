use access_service::{
    build_router,
    config::{AccessConfig, DeliveryMode, StoreBackend},
    services::{
        store::{MemoryStore, PgStore},
        DisabledDelivery, GrantDelivery, SmtpDelivery, SystemClock,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        transport = ?config.grant.transport,
        "Starting access service"
    );

    let delivery: Arc<dyn GrantDelivery> = match config.delivery.mode {
        DeliveryMode::Smtp => {
            let smtp = config.delivery.smtp.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("SMTP settings missing for smtp delivery"))
            })?;
            Arc::new(SmtpDelivery::new(smtp).map_err(AppError::from)?)
        }
        DeliveryMode::Disabled => {
            tracing::warn!("Grant delivery disabled; approved users must log in for a token");
            Arc::new(DisabledDelivery)
        }
    };

    let clock = Arc::new(SystemClock);

    let state = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; all state is lost on restart");
            AppState::build(config.clone(), Arc::new(MemoryStore::new()), clock, delivery)
        }
        StoreBackend::Postgres => {
            let url = config.store.database_url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required for postgres"))
            })?;
            let store = PgStore::connect(url, config.store.max_connections)
                .await
                .map_err(AppError::DatabaseError)?;
            store.migrate().await.map_err(AppError::DatabaseError)?;
            tracing::info!("Database initialized successfully");

            AppState::build(config.clone(), Arc::new(store), clock, delivery)
        }
    };

    let app = build_router(state).await?;

    let addr = config.common.bind_address()?;

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
