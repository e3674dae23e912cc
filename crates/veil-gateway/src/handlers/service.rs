//! Service-level handlers

use crate::ApiError;
use axum::{http::Uri, response::IntoResponse};

/// GET /ping - Health check
pub async fn ping() -> impl IntoResponse {
    "pong"
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("no route for {}", uri.path()))
}
