use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Clock-driven permits
///
/// Waiters queue on a fair mutex around one interval, so each tick goes to
/// exactly one caller in arrival order. Missed ticks are skipped rather than
/// replayed in a burst.
pub(super) struct Ticker {
    period: Duration,
    clock: Mutex<Option<Interval>>,
}

impl Ticker {
    pub(super) fn new(period: Duration) -> Self {
        Self {
            period,
            clock: Mutex::new(None),
        }
    }

    pub(super) async fn tick(&self) {
        let mut clock = self.clock.lock().await;
        let clock = clock.get_or_insert_with(|| {
            let mut clock = interval(self.period);
            clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
            clock
        });
        clock.tick().await;
    }
}
