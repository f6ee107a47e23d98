//! services/api/src/web/rate_limit.rs
//!
//! Fixed-window request limits for the routes that send email or SMS.
//!
//! Each client gets `max_requests` per window. The window opens with the client's
//! first request and the counter is dropped when it closes, so memory stays
//! bounded by the number of clients seen within one window.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use moka::sync::Cache;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::ApiError;

pub const OTP_LIMIT_MESSAGE: &str =
    "Too many verification requests. Please try again in 15 minutes.";
pub const RESET_LIMIT_MESSAGE: &str =
    "Too many password reset requests. Please try again in an hour.";

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

pub struct RateLimiter {
    hits: Cache<String, Arc<AtomicU32>>,
    max_requests: u32,
    message: &'static str,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, message: &'static str) -> Self {
        Self {
            hits: Cache::builder().time_to_live(window).build(),
            max_requests,
            message,
        }
    }

    /// Counts one request from `client`. `false` once the allowance is spent.
    pub fn check(&self, client: &str) -> bool {
        let counter = self
            .hits
            .get_with(client.to_string(), || Arc::new(AtomicU32::new(0)));
        counter.fetch_add(1, Ordering::SeqCst) < self.max_requests
    }
}

/// The caller's address, preferring the headers set by a fronting proxy over
/// the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };
    header_ip("cf-connecting-ip")
        .or_else(|| header_ip("x-forwarded-for"))
        .or_else(|| header_ip("x-real-ip"))
        .or(peer)
}

/// Middleware rejecting a client's requests with 429 once its allowance is spent.
pub async fn limit_requests(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_ip(request.headers(), peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    if !limiter.check(&client) {
        warn!(%client, path = %request.uri().path(), "Rate limit exceeded");
        return Err(ApiError::RateLimited(limiter.message.to_string()));
    }
    Ok(next.run(request).await)
}
