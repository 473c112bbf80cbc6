use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::interval::{Interval, InvalidIntervalError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionParseError {
    #[error(transparent)]
    InvalidInterval(#[from] InvalidIntervalError),
    #[error("resolution `{interval}` must retain at least one bucket")]
    ZeroRetention { interval: CompactString },
    #[error("resolution `{interval}` retention of {retention} buckets exceeds the calendar range")]
    RetentionOverflow {
        interval: CompactString,
        retention: u32,
    },
}

/// Declarative form of a [`Resolution`], as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    pub interval: CompactString,
    pub retention: u32,
}

impl ResolutionConfig {
    pub fn new(interval: impl Into<CompactString>, retention: u32) -> Self {
        Self {
            interval: interval.into(),
            retention,
        }
    }
}

/// One bucket lattice: an interval plus the number of buckets kept,
/// counting the bucket that contains "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    interval: Interval,
    retention: u32,
}

impl Resolution {
    pub fn new(interval: Interval, retention: u32) -> Result<Self, ResolutionParseError> {
        if retention == 0 {
            return Err(ResolutionParseError::ZeroRetention {
                interval: interval.to_string().into(),
            });
        }
        // Every limit computed from a present-day clock must stay representable.
        let span = i32::try_from(retention - 1)
            .ok()
            .and_then(|k| interval.duration().checked_mul(k))
            .filter(|span| OffsetDateTime::UNIX_EPOCH.checked_sub(*span).is_some());
        if span.is_none() {
            return Err(ResolutionParseError::RetentionOverflow {
                interval: interval.to_string().into(),
                retention,
            });
        }
        Ok(Self {
            interval,
            retention,
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn retention(&self) -> u32 {
        self.retention
    }

    pub fn duration(&self) -> Duration {
        self.interval.duration()
    }

    pub fn truncate(&self, t: OffsetDateTime) -> OffsetDateTime {
        self.interval.truncate(t)
    }

    /// Bucket start for `t`.
    pub fn get(&self, t: OffsetDateTime) -> OffsetDateTime {
        self.truncate(t)
    }

    pub fn add(&self, t: OffsetDateTime, k: i64) -> OffsetDateTime {
        self.interval.add(t, k)
    }

    /// Oldest bucket start still within retention at `now`.
    pub fn limit(&self, now: OffsetDateTime) -> OffsetDateTime {
        self.add(self.truncate(now), -(i64::from(self.retention) - 1))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interval)
    }
}

impl TryFrom<&ResolutionConfig> for Resolution {
    type Error = ResolutionParseError;

    fn try_from(config: &ResolutionConfig) -> Result<Self, Self::Error> {
        let interval = config.interval.parse::<Interval>()?;
        Self::new(interval, config.retention)
    }
}
