use std::{fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

/// Source of "now" for retention, eviction and scheduling decisions.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.0.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock()
    }
}

/// Wall clock that follows tokio's time source, so a paused runtime drives
/// scheduling and retention deterministically.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: OffsetDateTime,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: OffsetDateTime) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        let elapsed = Duration::try_from(self.started.elapsed()).unwrap_or(Duration::MAX);
        self.base.saturating_add(elapsed)
    }
}

/// How long to sleep from `now` until `deadline`; zero if it already passed.
pub fn until(now: OffsetDateTime, deadline: OffsetDateTime) -> std::time::Duration {
    std::time::Duration::try_from(deadline - now).unwrap_or_default()
}
