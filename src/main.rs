//! Pong Arena Server - authoritative two-player pong
//!
//! This is the main entry point for the game server. It handles:
//! - The match task (fixed-rate physics ticks and heartbeats)
//! - WebSocket connections for participants
//! - A health endpoint for deployment checks

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pong_arena::app::AppState;
use pong_arena::config::Config;
use pong_arena::game::{GameSession, SessionHandle, SessionSettings};
use pong_arena::http::build_router;
use pong_arena::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Pong Arena Server");
    info!(
        addr = %config.server_addr,
        tick_rate_hz = config.tick_rate_hz,
        heartbeat_ms = config.heartbeat_interval_ms,
        lag_comp_ms = config.lag_comp_ms,
        "Configuration loaded"
    );

    // Spawn the match task
    let (session, handle) = GameSession::new(SessionSettings::from(&config), rand::random());
    let session_task = tokio::spawn(session.run());

    // Build router
    let addr: SocketAddr = config.server_addr;
    let router = build_router(AppState::new(config, handle.clone()));

    // Start server
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(handle))
        .await?;

    if let Err(e) = session_task.await {
        error!(error = %e, "Session task failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler.
/// Ends the match first so open WebSockets close and the server can drain.
async fn shutdown_signal(session: SessionHandle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }

    session.shutdown().await;
}
