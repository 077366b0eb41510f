//! # Middleware Module
//!
//! Global request rate limiting for the admin API.
//!
//! The budget comes from `ServerConfig::rate_limit` (`SLHD_RATE_LIMIT`
//! overrides it); 0 disables the limiter entirely.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Fallback when a zero budget reaches `create_rate_limiter`.
const FALLBACK_RPS: NonZeroU32 = NonZeroU32::MIN.saturating_add(99);

/// Shared, unkeyed limiter.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Build a limiter allowing `requests_per_second`.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(FALLBACK_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// A limiter for `requests_per_second`, or `None` when limiting is off.
pub fn limiter_for(requests_per_second: u32) -> Option<GlobalRateLimiter> {
    (requests_per_second > 0).then(|| create_rate_limiter(requests_per_second))
}

/// Answer 429 once the global budget is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if limiter.check().is_ok() {
        return Ok(next.run(request).await);
    }
    tracing::warn!(
        event = "rate_limited",
        path = %request.uri().path(),
        "Rate limit exceeded"
    );
    Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
}
