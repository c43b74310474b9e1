pub mod accounts;
pub mod bulk;
pub mod config;
pub mod error;
pub mod observability;
pub mod registry;
pub mod salesforce;
pub mod server;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::bulk::{spawn_bulk_load, BulkJobScheduler, TracingObserver};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::registry::ConnectionRegistry;
use crate::salesforce::{build_http_client, BrokerClient};
use crate::state::AppState;

/// Resolves every configured connection. Nothing is served if this fails.
pub async fn build_registry(
    config: &AppConfig,
    http: &reqwest::Client,
) -> Result<Arc<ConnectionRegistry>, AppError> {
    let broker = BrokerClient::new(http.clone(), &config.broker);
    let registry = ConnectionRegistry::initialize(&config.broker, &broker).await?;
    Ok(Arc::new(registry))
}

/// Starts the service: builds the registry, binds the listener, launches
/// the background bulk load, then serves the read surface until the
/// listener fails. A bind failure stops startup before any load is queued.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let http = build_http_client()?;
    let registry = build_registry(&config, &http).await?;

    info!(
        "[REGISTRY] {} connection(s) ready: {}",
        registry.len(),
        registry.names().join(", ")
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Listener(format!("failed to bind {}: {}", addr, e)))?;

    info!("[HTTP] Listening on {}", addr);

    let scheduler = BulkJobScheduler::single();
    // Detached; its outcome goes to the observer.
    let _bulk_task = spawn_bulk_load(
        &registry,
        http.clone(),
        &config.bulk,
        &scheduler,
        Arc::new(TracingObserver),
    );

    let app = server::router(AppState::new(registry, http));

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Listener(format!("server error: {}", e)))
}
