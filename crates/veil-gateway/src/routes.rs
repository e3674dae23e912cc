//! HTTP route definitions

use crate::{AppState, handlers, middleware};
use axum::{
    Router,
    routing::get,
    middleware as axum_middleware,
    extract::DefaultBodyLimit,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
    timeout::TimeoutLayer,
};

/// Largest accepted request body; requests only carry a path
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        // Service endpoints
        .route("/ping", get(handlers::ping))

        // Filesystem endpoints
        .route(
            "/api/fs/crypt_meta",
            get(handlers::crypt_meta_query).post(handlers::crypt_meta),
        )
        .fallback(handlers::not_found)

        // Apply middleware, innermost first
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.rate_limiter),
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::client_ip_middleware));

    // CORS configuration
    let router = if state.config.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(state.config.request_timeout_secs)))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}
