use std::{fmt, str::FromStr, sync::LazyLock};

use compact_str::{CompactString, ToCompactString};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset, Weekday};

use super::ValidationError;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
)]
pub enum IntervalUnit {
    #[strum(serialize = "s")]
    Second,
    #[strum(serialize = "m")]
    Minute,
    #[strum(serialize = "h")]
    Hour,
    #[strum(serialize = "d")]
    Day,
    #[strum(serialize = "w")]
    Week,
}

impl IntervalUnit {
    pub const fn as_secs(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 60 * 60,
            Self::Day => 24 * 60 * 60,
            Self::Week => 7 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid interval `{spec}`: {reason}")]
pub struct InvalidIntervalError {
    pub spec: CompactString,
    pub reason: ValidationError,
}

impl InvalidIntervalError {
    fn new(spec: &str, reason: impl Into<ValidationError>) -> Self {
        Self {
            spec: spec.to_compact_string(),
            reason: reason.into(),
        }
    }
}

/// A positive whole multiple of one calendar unit, written `<n><unit>`
/// where unit is one of `s`, `m`, `h`, `d`, `w`.
///
/// Truncation is aligned to 0001-01-01T00:00:00Z. Week intervals are
/// additionally shifted so that every bucket starts on a Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    count: u32,
    unit: IntervalUnit,
}

impl Interval {
    pub fn new(count: u32, unit: IntervalUnit) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err("interval count must be positive".into());
        }
        Ok(Self { count, unit })
    }

    /// Express a whole number of seconds as an interval.
    pub fn from_secs(secs: u64) -> Result<Self, ValidationError> {
        let count = u32::try_from(secs)
            .map_err(|_| ValidationError::from(format!("{secs}s exceeds the maximum interval")))?;
        Self::new(count, IntervalUnit::Second)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.count) * self.unit.as_secs())
    }

    fn as_nanos(&self) -> i128 {
        i128::from(self.count) * i128::from(self.unit.as_secs()) * NANOS_PER_SECOND
    }

    /// Start of the interval that contains `t`.
    pub fn truncate(&self, t: OffsetDateTime) -> OffsetDateTime {
        let t = t.to_offset(UtcOffset::UTC);
        match self.unit {
            IntervalUnit::Week => {
                // Aligning on the Monday anchor and stepping back a day yields
                // the Sunday at or before `t`; a Sunday must first be pushed
                // into the following Monday-aligned week.
                let shifted = if t.weekday() == Weekday::Sunday {
                    t + Duration::DAY
                } else {
                    t
                };
                truncate_from_anchor(shifted, self.as_nanos()) - Duration::DAY
            }
            _ => truncate_from_anchor(t, self.as_nanos()),
        }
    }

    /// Whether both intervals produce the same bucket starts, e.g. `60m`
    /// and `1h`. Weeks are shifted to Sunday, so `1w` and `7d` differ.
    pub fn same_lattice(&self, other: &Self) -> bool {
        self.duration() == other.duration()
            && (self.unit == IntervalUnit::Week) == (other.unit == IntervalUnit::Week)
    }

    /// `t` moved by `k` whole intervals, clamped to the representable range.
    pub fn add(&self, t: OffsetDateTime, k: i64) -> OffsetDateTime {
        let secs = (i64::from(self.count) * self.unit.as_secs()).saturating_mul(k);
        t.saturating_add(Duration::seconds(secs))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit)
    }
}

impl FromStr for Interval {
    type Err = InvalidIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(unit_start) = s.char_indices().last().map(|(idx, _)| idx) else {
            return Err(InvalidIntervalError::new(s, "must not be empty"));
        };
        let (digits, unit) = s.split_at(unit_start);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidIntervalError::new(
                s,
                "must begin with a decimal count",
            ));
        }
        let unit = unit
            .parse::<IntervalUnit>()
            .map_err(|_| InvalidIntervalError::new(s, "unit must be one of s, m, h, d, w"))?;
        let count = digits
            .parse::<u32>()
            .map_err(|e| InvalidIntervalError::new(s, e.to_string()))?;
        Self::new(count, unit).map_err(|reason| InvalidIntervalError::new(s, reason))
    }
}

impl serde::Serialize for Interval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Interval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = CompactString::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Unix nanoseconds of the first Monday on or after 0001-01-01.
fn anchor_unix_nanos() -> i128 {
    static ANCHOR: LazyLock<i128> = LazyLock::new(|| {
        let first = Date::from_calendar_date(1, Month::January, 1)
            .expect("0001-01-01 is representable");
        let monday = if first.weekday() == Weekday::Monday {
            first
        } else {
            first.next_occurrence(Weekday::Monday)
        };
        monday.midnight().assume_utc().unix_timestamp_nanos()
    });
    *ANCHOR
}

fn truncate_from_anchor(t: OffsetDateTime, step_nanos: i128) -> OffsetDateTime {
    let anchor = anchor_unix_nanos();
    let since_anchor = t.unix_timestamp_nanos() - anchor;
    let truncated = since_anchor - since_anchor.rem_euclid(step_nanos);
    OffsetDateTime::from_unix_timestamp_nanos(anchor + truncated)
        .expect("invariant violation: truncated instant out of range")
}
