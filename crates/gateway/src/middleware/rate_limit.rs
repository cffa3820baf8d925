//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use paperscout_common::config::RateLimitConfig;
use paperscout_common::errors::{AppError, Result};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::AppState;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Result<Arc<GlobalRateLimiter>> {
    let per_second = NonZeroU32::new(requests_per_second).ok_or_else(|| AppError::Configuration {
        message: "rate_limit.requests_per_second must be positive".to_string(),
    })?;
    let burst = NonZeroU32::new(burst).ok_or_else(|| AppError::Configuration {
        message: "rate_limit.burst must be positive".to_string(),
    })?;

    Ok(Arc::new(RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst))))
}

/// `None` when rate limiting is turned off
pub fn from_config(config: &RateLimitConfig) -> Result<Option<Arc<GlobalRateLimiter>>> {
    if !config.enabled {
        return Ok(None);
    }
    create_rate_limiter(config.requests_per_second, config.burst).map(Some)
}

/// Rate limiting middleware for the scan triggers
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            return Err(AppError::RateLimited {
                limit: state.config.rate_limit.requests_per_second,
            });
        }
    }
    Ok(next.run(request).await)
}
