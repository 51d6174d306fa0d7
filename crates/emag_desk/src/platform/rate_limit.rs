use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use super::types::Resource;

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Published Marketplace API limits (requests per second).
pub mod rate_limits {
    /// `order/*` endpoints.
    pub const EMAG_ORDERS_RPS: u32 = 12;
    /// Every other resource, offers included.
    pub const EMAG_DEFAULT_RPS: u32 = 3;
}

/// Default request rate for a resource.
pub fn default_rps_for_resource(resource: Resource) -> u32 {
    match resource {
        Resource::Orders => rate_limits::EMAG_ORDERS_RPS,
        Resource::ProductOffers => rate_limits::EMAG_DEFAULT_RPS,
    }
}

/// Token-bucket limiter shared by every task issuing requests for one
/// integration.
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(rate_limits::EMAG_ORDERS_RPS);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    rps: u32,
}

impl ApiRateLimiter {
    /// A zero rate is treated as one request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            rps: rps.get(),
        }
    }

    /// Wait until the limiter lets one more request through.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }

    pub fn requests_per_second(&self) -> u32 {
        self.rps
    }
}

/// One limiter per resource family, sized from the published limits unless
/// overridden.
#[derive(Clone)]
pub struct ResourceLimiters {
    orders: ApiRateLimiter,
    other: ApiRateLimiter,
}

impl ResourceLimiters {
    pub fn new(orders_rps: u32, default_rps: u32) -> Self {
        Self {
            orders: ApiRateLimiter::new(orders_rps),
            other: ApiRateLimiter::new(default_rps),
        }
    }

    pub fn for_resource(&self, resource: Resource) -> &ApiRateLimiter {
        match resource {
            Resource::Orders => &self.orders,
            Resource::ProductOffers => &self.other,
        }
    }
}

impl Default for ResourceLimiters {
    fn default() -> Self {
        Self::new(rate_limits::EMAG_ORDERS_RPS, rate_limits::EMAG_DEFAULT_RPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_zero_rps_falls_back_to_one() {
        assert_eq!(ApiRateLimiter::new(0).requests_per_second(), 1);
    }

    #[test]
    fn test_default_limits_per_resource() {
        let limiters = ResourceLimiters::default();
        assert_eq!(
            limiters.for_resource(Resource::Orders).requests_per_second(),
            rate_limits::EMAG_ORDERS_RPS
        );
        assert_eq!(
            limiters
                .for_resource(Resource::ProductOffers)
                .requests_per_second(),
            rate_limits::EMAG_DEFAULT_RPS
        );
        assert_eq!(default_rps_for_resource(Resource::Orders), 12);
    }

    #[tokio::test]
    async fn test_burst_within_quota_is_not_delayed() {
        let limiter = ApiRateLimiter::new(50);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_clones_share_the_bucket() {
        let limiter = ApiRateLimiter::new(1);
        let clone = limiter.clone();
        limiter.wait().await;
        let start = Instant::now();
        clone.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
