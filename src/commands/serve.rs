//! Run the HTTP API

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn execute(settings: Settings) -> anyhow::Result<()> {
    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    let app = create_router(Arc::new(AppState::new(settings.clone())), &settings);

    info!("Server listening on http://{}", addr);
    info!("API Endpoints:");
    info!("   POST /api/snapshots                              - Capture a live database");
    info!("   POST /api/snapshots/import                       - Import an inventory document");
    info!("   GET  /api/sources                                - List sources");
    info!("   GET  /api/sources/{{source}}/snapshots             - List snapshots");
    info!("   POST /api/sources/{{source}}/snapshots/{{v}}/baseline - Set baseline");
    info!("   GET  /api/sources/{{source}}/changes               - Diff two versions");
    info!("   GET  /api/sources/{{source}}/drift                 - Diff baseline against latest");
    info!("   POST /api/changes                                - Diff two inline documents");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
