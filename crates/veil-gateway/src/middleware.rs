//! HTTP middleware for client identification, rate limiting, etc.

use crate::ApiError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, state::keyed::DefaultKeyedStateStore};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Longest client-supplied request id that is echoed back
const MAX_REQUEST_ID_LEN: usize = 128;

/// Rate limiter type
pub type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

/// Create a rate limiter
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<KeyedRateLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// Periodically drop limiter entries for clients whose quota has fully
/// refilled, so the keyed store does not grow with every address seen
pub fn spawn_limiter_pruning(limiter: Arc<KeyedRateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let before = limiter.len();
            limiter.retain_recent();
            limiter.shrink_to_fit();
            tracing::trace!(before, after = limiter.len(), "rate limiter pruned");
        }
    })
}

/// Client address extension, `None` when neither proxy headers nor the
/// socket peer are known
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

/// Client address from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());
    from_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    })
}

/// Client IP middleware - resolves the caller's address once per request
pub async fn client_ip_middleware(mut request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = forwarded_ip(request.headers()).or(peer);
    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

/// Rate limiting middleware, keyed by client address
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<KeyedRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request
        .extensions()
        .get::<ClientIp>()
        .and_then(|ClientIp(ip)| ip.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "anonymous".to_string());

    if limiter.check_key(&key).is_err() {
        tracing::debug!(client = %key, "rate limited");
        return Err(ApiError::too_many_requests());
    }

    Ok(next.run(request).await)
}

/// Request id middleware.
///
/// Keeps a well-formed `x-request-id` sent by the client, otherwise assigns
/// a fresh UUID. The id is stored as a [`RequestId`] extension and echoed on
/// the response.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Request id extension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Access log middleware. Handler events are recorded inside a `request`
/// span carrying the request id.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|RequestId(id)| id.clone())
        .unwrap_or_default();
    let client = request
        .extensions()
        .get::<ClientIp>()
        .and_then(|ClientIp(ip)| *ip);
    let start = Instant::now();

    let span = tracing::info_span!("request", request_id = %request_id);
    let response = next.run(request).instrument(span).await;

    tracing::info!(
        request_id = %request_id,
        client = ?client,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
