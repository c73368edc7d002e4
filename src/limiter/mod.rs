//! Shared rate limiter
//!
//! One [`RateLimiter`] gates every fetch attempt across the whole pool. Each
//! attempt consumes one permit; whichever worker is first in line gets it.
//!
//! # Strategies
//!
//! - [`RateStrategy::Ticker`]: permits follow a fixed clock. A tick that no
//!   worker is waiting for is dropped, except that one missed tick is held
//!   for the next caller, as a clock ticker with a one-slot buffer behaves.
//! - [`RateStrategy::TokenBucket`]: permits accrue while idle up to `burst`.
//! - [`RateStrategy::Unlimited`]: every request is granted immediately.

mod bucket;
mod ticker;

use crate::config::{RateLimitConfig, RateStrategyKind};
use bucket::TokenBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use ticker::Ticker;
use tokio_util::sync::CancellationToken;

/// How permits are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateStrategy {
    Unlimited,
    Ticker { interval: Duration },
    TokenBucket { interval: Duration, burst: u32 },
}

impl RateStrategy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if config.interval_ms == 0 {
            return Self::Unlimited;
        }

        let interval = Duration::from_millis(config.interval_ms);
        match config.strategy {
            RateStrategyKind::Ticker => Self::Ticker { interval },
            RateStrategyKind::TokenBucket => Self::TokenBucket {
                interval,
                burst: config.burst.max(1),
            },
        }
    }
}

enum Gate {
    Unlimited,
    Ticker(Ticker),
    Bucket(TokenBucket),
}

/// Rate limiter shared by all workers
///
/// Timers are created on first use, so a limiter can be built outside a
/// runtime. They are released when the last worker drops its handle.
pub struct RateLimiter {
    strategy: RateStrategy,
    gate: Gate,
    granted: AtomicU64,
}

impl RateLimiter {
    /// Builds a limiter for `strategy`
    ///
    /// A zero interval means no limit, whichever strategy names it.
    pub fn new(strategy: RateStrategy) -> Self {
        let strategy = match strategy {
            RateStrategy::Ticker { interval } | RateStrategy::TokenBucket { interval, .. }
                if interval.is_zero() =>
            {
                RateStrategy::Unlimited
            }
            other => other,
        };

        let gate = match strategy {
            RateStrategy::Unlimited => Gate::Unlimited,
            RateStrategy::Ticker { interval } => Gate::Ticker(Ticker::new(interval)),
            RateStrategy::TokenBucket { interval, burst } => TokenBucket::new(interval, burst)
                .map(Gate::Bucket)
                .unwrap_or(Gate::Unlimited),
        };

        Self {
            strategy,
            gate,
            granted: AtomicU64::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(RateStrategy::Unlimited)
    }

    /// Number of permits handed out so far
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Waits for one permit
    pub async fn acquire(&self) {
        match &self.gate {
            Gate::Unlimited => {}
            Gate::Ticker(ticker) => ticker.tick().await,
            Gate::Bucket(bucket) => bucket.take().await,
        }
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    /// Waits for one permit unless `cancel` fires first
    ///
    /// # Returns
    ///
    /// * `true` - A permit was granted
    /// * `false` - The run was cancelled; no permit was consumed
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => false,
            _ = self.acquire() => true,
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("strategy", &self.strategy)
            .field("granted", &self.granted())
            .finish()
    }
}
