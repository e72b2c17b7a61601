//! Fazenda Sync agent binary.
//!
//! Wires configuration, storage, reachability and the remote applier into an
//! outbox and serves the local API.

use std::sync::Arc;
use std::time::Duration;

use fazenda_sync::{
    build_router, websocket, AppState, Config, ConnectionManager, FileStore, HttpApplier,
    HttpApplierConfig, HttpProbe, KeyValueStore, ManualReachability, NoopApplier, Outbox,
    OutboxConfig, Reachability, RemoteApplier,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fazenda_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Fazenda Sync on {}:{}", config.host, config.port);

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir).await?);

    let remote: Arc<dyn RemoteApplier> = match &config.remote_url {
        Some(url) => {
            tracing::info!(remote_url = %url, "Delivering actions over HTTP");
            Arc::new(HttpApplier::new(HttpApplierConfig {
                base_url: url.clone(),
                auth_token: config.auth_token.clone(),
                timeout: config.apply_timeout,
            })?)
        }
        None => {
            tracing::warn!("REMOTE_URL not set, actions are acknowledged locally");
            Arc::new(NoopApplier::new(Duration::from_millis(100)))
        }
    };

    let reachability: Arc<dyn Reachability> = match &config.probe_url {
        Some(url) => {
            let probe = Arc::new(HttpProbe::new(url.clone(), config.probe_interval)?);
            probe.clone().spawn();
            probe
        }
        None => ManualReachability::new_shared(true),
    };

    let outbox = Outbox::start(store, remote, reachability, OutboxConfig::from(&config)).await;

    // Push status changes to WebSocket clients
    let conn_manager = ConnectionManager::new_shared();
    let _status_forwarding = websocket::forward_status_changes(&outbox, conn_manager.clone());

    let state = AppState {
        outbox,
        config: Arc::new(config.clone()),
        conn_manager,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
