//! Filesystem handlers (crypt metadata)

use crate::middleware::ClientIp;
use crate::{ApiError, ApiResponse, AppState};
use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Extension, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use veil_storage::{Headers, LinkArgs};

/// Request body / query of the crypt metadata endpoint
#[derive(Debug, Default, Deserialize)]
pub struct CryptMetaRequest {
    #[serde(default)]
    pub path: String,
}

/// POST /api/fs/crypt_meta
pub async fn crypt_meta(
    State(state): State<Arc<AppState>>,
    Extension(client_ip): Extension<ClientIp>,
    headers: HeaderMap,
    payload: Result<Json<CryptMetaRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    resolve(&state, client_ip, &headers, &request.path).await
}

/// GET /api/fs/crypt_meta?path=...
pub async fn crypt_meta_query(
    State(state): State<Arc<AppState>>,
    Extension(client_ip): Extension<ClientIp>,
    headers: HeaderMap,
    query: Result<Query<CryptMetaRequest>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(request) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    resolve(&state, client_ip, &headers, &request.path).await
}

async fn resolve(
    state: &AppState,
    ClientIp(client_ip): ClientIp,
    headers: &HeaderMap,
    path: &str,
) -> Result<Response, ApiError> {
    let policy = state.proxy_policy(api_base(&state.config.site_url, headers));
    let args = link_args(client_ip, headers);

    let metadata = state.assembler.resolve(path, &args, &policy).await?;
    tracing::debug!(
        path = %metadata.path,
        mode = ?metadata.mode,
        proxied = metadata.remote.headers.is_none(),
        "crypt metadata resolved"
    );
    Ok(ApiResponse::success(metadata).into_response())
}

/// Public base URL of this server for the current request
pub fn api_base(site_url: &str, headers: &HeaderMap) -> String {
    let site_url = site_url.trim().trim_end_matches('/');
    if !site_url.is_empty() {
        return site_url.to_string();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .unwrap_or("localhost");
    format!("{}://{}", proto, host)
}

/// Caller context forwarded to backend link fetches
pub fn link_args(client_ip: Option<IpAddr>, headers: &HeaderMap) -> LinkArgs {
    let mut forwarded = Headers::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            forwarded
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    LinkArgs {
        client_ip,
        headers: forwarded,
    }
}
