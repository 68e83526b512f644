//! API Server setup

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::routes::create_router;
use super::state::AppState;

/// Router with middleware applied.
pub fn create_app(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let mut router = create_router(state).layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    router
}

/// Serve until the process is stopped or ctrl-c is received.
pub async fn run_server(state: AppState) -> std::io::Result<()> {
    let addr = state.config.bind_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Proof chain server listening on {}", addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Serve in the background; returns the bound address (for tests).
pub async fn start_background_server(state: AppState) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(state.config.bind_addr).await?;
    let actual_addr = listener.local_addr()?;
    let app = create_app(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
