/// Per-client rate limiting for the public authentication endpoints
use crate::{
    api::middleware::client_addr,
    config::RateLimitConfig,
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter,
};
use std::num::NonZeroU32;

/// Keyed token bucket, one bucket per client address.
///
/// Buckets are created on first use. The underlying map is sharded, so
/// different addresses do not contend and a single address never double-spends.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl ClientRateLimiter {
    pub fn new(per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(burst);

        Self {
            limiter: GovernorLimiter::keyed(quota),
            clock: DefaultClock::default(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.per_second, config.burst)
    }

    /// Take one token for the address if available
    pub fn allow(&self, addr: &str) -> bool {
        self.check(addr).is_ok()
    }

    /// Take one token, or report how long until the next one
    pub fn check(&self, addr: &str) -> ApiResult<()> {
        self.limiter
            .check_key(&addr.to_string())
            .map_err(|not_until| ApiError::RateLimited {
                retry_after: not_until.wait_time_from(self.clock.now()),
            })
    }

    /// Drop buckets that have refilled completely
    pub fn prune(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        before.saturating_sub(self.limiter.len())
    }

    /// Number of addresses currently holding a bucket
    pub fn tracked_addresses(&self) -> usize {
        self.limiter.len()
    }
}

/// Rate limiting middleware keyed on the client address
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !ctx.config.rate_limit.enabled {
        return Ok(next.run(request).await);
    }

    let addr = client_addr(
        request.headers(),
        request.extensions(),
        ctx.config.service.trust_forwarded_for,
    );

    if let Err(e) = ctx.rate_limiter.check(&addr) {
        tracing::warn!(client_addr = %addr, path = %request.uri().path(), "rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(request).await)
}
