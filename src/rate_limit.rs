//! Per-user throttling for write endpoints.
//!
//! Requests are counted per (route, target, user) in a token bucket that
//! refills over a minute. Handlers check the quota only once the caller is
//! authenticated and the target exists, so rejected requests never use it.

use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use std::num::NonZeroU32;

use crate::api::ApiError;

/// Route name, target id, user id.
pub type ThrottleKey = (&'static str, i64, i64);

/// Rate limiter keyed by route, target and user.
pub type UserLimiter<C = DefaultClock> = RateLimiter<
    ThrottleKey,
    DefaultKeyedStateStore<ThrottleKey>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

/// Build a limiter allowing `per_minute` requests per key.
pub fn user_limiter(per_minute: u32) -> UserLimiter {
    RateLimiter::keyed(quota(per_minute))
}

fn quota(per_minute: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN))
}

/// Count one request against `key`, or reject it with 429 once the quota is spent.
pub fn check_quota<C: Clock>(limiter: &UserLimiter<C>, key: ThrottleKey) -> Result<(), ApiError> {
    if limiter.check_key(&key).is_err() {
        tracing::debug!(route = key.0, target = key.1, user_id = key.2, "Request throttled");
        return Err(ApiError::too_many_requests(
            "Too many requests. Please try again later.",
        ));
    }
    Ok(())
}

/// Drop keys whose bucket has fully refilled. Returns how many keys remain.
pub fn prune_limiter<C: Clock>(limiter: &UserLimiter<C>) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}
