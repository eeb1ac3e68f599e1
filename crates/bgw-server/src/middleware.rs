// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request middleware: client-IP resolution, rate limiting, metrics.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bgw_error::ErrorCode;
use bgw_telemetry::RequestSample;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

/// The resolved client IP, honoring `X-Forwarded-For` from the edge proxy.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

/// Resolve and stash the client IP before anything else runs.
pub async fn client_ip(mut request: Request, next: Next) -> Response {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    let ip = forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip())
    });
    if let Some(ip) = ip {
        request.extensions_mut().insert(ClientIp(ip));
    }
    next.run(request).await
}

/// Fixed-window rate limiting through the per-IP actors. A request with no
/// resolvable IP passes (the actor layer fails open by policy).
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ClientIp(ip)) = request.extensions().get::<ClientIp>().copied() else {
        return next.run(request).await;
    };

    let decision = state.limiter.check_and_increment(ip).await;
    if !decision.allowed {
        let mut response = ApiError::new(
            ErrorCode::RateLimitExceeded,
            "rate limit exceeded; slow down",
        )
        .into_response();
        if let Ok(retry) = HeaderValue::from_str(&decision.retry_after_secs().to_string()) {
            response.headers_mut().insert("retry-after", retry);
        }
        return response;
    }

    let mut response = next.run(request).await;
    if let Ok(remaining) = HeaderValue::from_str(&decision.remaining.to_string()) {
        response.headers_mut().insert("x-ratelimit-remaining", remaining);
    }
    response
}

/// Record one metrics sample per request. Handlers that served from cache
/// set `x-cache`, which this middleware folds into the sample.
pub async fn record_metrics(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;

    let cached = response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v != "MISS");
    state.metrics.record(RequestSample {
        endpoint,
        status: response.status().as_u16(),
        duration_ms: started.elapsed().as_millis() as u64,
        cached,
        at: chrono::Utc::now(),
    });
    response
}
