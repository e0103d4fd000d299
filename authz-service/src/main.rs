use authz_service::{
    build_router,
    config::AuthzConfig,
    services::{
        AuditWriter, Database, HttpIdentityProvider, MembershipAuthorizer, SecurityEventLogger,
    },
    AppState,
};
use service_core::observability::logging::init_tracing;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthzConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authorization service"
    );

    tracing::info!("Initializing database connection");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            service_core::error::AppError::DatabaseError(anyhow::anyhow!(
                "failed to connect to PostgreSQL: {}",
                e
            ))
        })?;

    let db = Database::new(pool);
    db.run_migrations().await?;
    tracing::info!("Database initialized successfully");

    let identity = HttpIdentityProvider::new(&config.identity_provider).map_err(|e| {
        service_core::error::AppError::ConfigError(anyhow::anyhow!(
            "failed to build identity provider client: {}",
            e
        ))
    })?;
    tracing::info!(
        base_url = %config.identity_provider.base_url,
        "Identity provider client initialized"
    );

    let store: Arc<dyn authz_service::services::AuthzStore> = Arc::new(db);
    let security_events = SecurityEventLogger::new();
    let authorizer = MembershipAuthorizer::new(store.clone(), security_events.clone());
    let (audit, audit_worker) = AuditWriter::spawn(
        store.clone(),
        security_events.clone(),
        config.audit.queue_capacity,
    );
    tracing::info!(
        queue_capacity = config.audit.queue_capacity,
        "Audit writer initialized"
    );

    let state = AppState {
        config: config.clone(),
        store,
        identity: Arc::new(identity),
        authorizer,
        security_events,
        audit,
    };

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router (and its AppState clones) is dropped once serve returns,
    // which closes the audit channel and lets the worker drain and exit.
    if let Err(e) = audit_worker.await {
        tracing::error!(error = %e, "Audit worker did not shut down cleanly");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
