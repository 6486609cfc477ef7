//! Countdown Sync - countdown timers mirrored between two devices
//!
//! This is the main entry point for the countdown-sync application.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::mpsc};
use tracing::{error, info};

use countdown_sync::{
    api::create_router,
    config::Config,
    services::{open_store, serve_peer, TcpPeerChannel},
    state::AppState,
    sync::SyncDelegate,
    tasks::{
        engine_ticker_task, peer_inbound_task, peer_link_monitor_task, peer_outbound_task,
        store_writer_task, sync_push_task,
    },
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_sync={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-sync server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, role={}, peer={:?}, peer_listen={:?}",
        config.host,
        config.port,
        config.role.as_str(),
        config.peer,
        config.peer_listen
    );

    let store = Arc::from(open_store(config.state_file.as_deref()));
    let mut app_state = AppState::new(config.port, config.host.clone(), config.role, store);

    let delegate = config.peer.as_ref().map(|peer| {
        info!("Peer link to {}", peer);
        Arc::new(SyncDelegate::new(
            Arc::new(TcpPeerChannel::new(peer.clone())),
            config.sync_policy(),
        ))
    });
    if let Some(delegate) = &delegate {
        app_state = app_state.with_delegate(Arc::clone(delegate));
    }
    let state = Arc::new(app_state);

    // Store writer, engine ticker and periodic sync push
    tokio::spawn(store_writer_task(Arc::clone(&state)));
    tokio::spawn(engine_ticker_task(Arc::clone(&state), config.tick_period()));
    if let Some(delegate) = delegate {
        tokio::spawn(sync_push_task(Arc::clone(&state), config.sync_interval()));
        tokio::spawn(peer_link_monitor_task(Arc::clone(&delegate)));
        tokio::spawn(peer_outbound_task(Arc::clone(&state), delegate));
    }

    // Inbound peer link
    if let Some(peer_listen) = &config.peer_listen {
        let listener = TcpListener::bind(peer_listen).await?;
        let (inbox_tx, inbox_rx) = mpsc::channel(32);
        tokio::spawn(peer_inbound_task(Arc::clone(&state), inbox_rx));
        tokio::spawn(async move {
            if let Err(e) = serve_peer(listener, inbox_tx).await {
                error!("Peer listener stopped: {}", e);
            }
        });
    }

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers                       - Create a timer at an index path");
    info!("  POST   /timers/move                  - Move a timer");
    info!("  DELETE /timers/:section/:item        - Remove a timer");
    info!("  POST   /timers/:section/:item/select - Select a timer");
    info!("  POST   /command/:command             - Drive the selected timer");
    info!("  GET    /model                        - Persisted model");
    info!("  POST   /peer                         - Peer message over HTTP");
    info!("  GET    /status                       - Current status");
    info!("  GET    /health                       - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Err(e) = state.save() {
        error!("Failed to save timer model on shutdown: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
