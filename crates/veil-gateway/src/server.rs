//! Server startup and lifecycle

use crate::{AppState, GatewayConfig, middleware, routes};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// How often idle clients are dropped from the rate limiter
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Serve until the process is killed
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, std::future::pending()).await
}

/// Mount the configured storages, bind, and serve until `shutdown_signal`
/// resolves. In-flight requests are drained before returning.
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    let state = Arc::new(AppState::new(config)?);
    let pruner = middleware::spawn_limiter_pruning(
        Arc::clone(&state.rate_limiter),
        LIMITER_PRUNE_INTERVAL,
    );
    let app = routes::create_router(state)
        .into_make_service_with_connect_info::<SocketAddr>();

    info!(addr = %listener.local_addr()?, "veil gateway listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await;
    pruner.abort();
    served?;

    info!("veil gateway stopped");
    Ok(())
}
