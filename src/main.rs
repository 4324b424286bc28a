//! Service Resilience - operational server
//!
//! Runs the cache maintenance tasks and serves the operational HTTP surface.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use service_resilience::{
    create_router, spawn_adaptive_ttl_task, spawn_cleanup_task, AppState, Config,
};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build cache, resilience state and remote clients
/// 4. Start background expiry sweep (and adaptive TTL, when enabled)
/// 5. Serve the router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "service_resilience=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting service resilience server");

    let config = Config::from_env();
    info!(
        port = config.server_port,
        cleanup_interval_secs = config.cleanup_interval,
        eviction_policy = ?config.cache.eviction_policy,
        failure_threshold = config.circuit.failure_threshold,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );
    if config.remote.jwt_secret.is_empty() {
        warn!("SERVICE_JWT_SECRET is empty, sibling services will reject service tokens");
    }

    let state = AppState::from_config(&config).context("failed to build remote clients")?;

    let mut background = vec![spawn_cleanup_task(
        state.cache.clone(),
        config.cleanup_interval,
    )];
    if config.adaptive.enabled {
        background.push(spawn_adaptive_ttl_task(
            state.cache.clone(),
            config.adaptive.policy.clone(),
            config.adaptive.interval,
        ));
    }
    info!(tasks = background.len(), "Background tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(background))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then aborts the background tasks.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
