use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket: one token per interval, holding at most `burst`
///
/// The bucket starts full, so an idle pipeline can spend `burst` permits at
/// once before settling to the steady rate.
pub(super) struct TokenBucket {
    limiter: DirectLimiter,
}

impl TokenBucket {
    /// Returns `None` for a zero interval
    pub(super) fn new(interval: Duration, burst: u32) -> Option<Self> {
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(interval)?.allow_burst(burst);

        Some(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    pub(super) async fn take(&self) {
        self.limiter.until_ready().await;
    }
}
