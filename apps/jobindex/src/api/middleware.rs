//! # Push Rate Limiting
//!
//! All push endpoints draw from one budget of `rate_limit` requests per
//! second. A delivery over budget gets 429 with `Retry-After`, and the push
//! subscription redelivers it after backing off. `/health` is not counted.

use super::{AppState, types::ErrorResponse};
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::time::Duration;

// =============================================================================
// PUSH LIMITER
// =============================================================================

/// Process-wide delivery budget.
pub struct PushLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
}

impl PushLimiter {
    /// Budget of `per_second` deliveries, or `None` when limiting is off.
    #[must_use]
    pub fn new(per_second: u32) -> Option<Self> {
        let rate = NonZeroU32::new(per_second)?;
        let clock = DefaultClock::default();
        Some(Self {
            limiter: RateLimiter::direct_with_clock(Quota::per_second(rate), clock.clone()),
            clock,
        })
    }

    /// Take one unit of budget, or report how long until one is available.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// Whole seconds for `Retry-After`, rounded up, never zero.
fn retry_after_secs(wait: Duration) -> u64 {
    (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Answer 429 once the delivery budget is spent.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.as_deref() else {
        return next.run(request).await;
    };
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    match limiter.acquire() {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let secs = retry_after_secs(wait);
            tracing::warn!(
                event = "rate_limited",
                path = %request.uri().path(),
                retry_after = secs,
                "Delivery over budget"
            );
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new(format!(
                    "Rate limit exceeded, retry in {} s",
                    secs
                ))),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
