//! Time-aggregation disciplines.
//!
//! Every series owned by a metric collector is folded by exactly one
//! [`Aggregator`]. The disciplines are a closed set; [`Aggregate`] is the
//! contract each variant's state implements, and [`Aggregator`] wraps the
//! state in a mutex so concurrent scrapers can feed the same series.

mod active_minutes;
mod average;
mod increase;
mod info;
mod irate;
mod max;

pub use active_minutes::ActiveMinutes;
pub use average::AverageOverTime;
pub use increase::{Increase, Rate};
pub use info::Info;
pub use irate::IRateMax;
pub use max::MaxOverTime;
use parking_lot::Mutex;
use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum AggregatorKind {
    ActiveMinutes,
    AverageOverTime,
    MaxOverTime,
    Increase,
    Rate,
    #[strum(serialize = "irate_max")]
    IRateMax,
    Info,
}

pub trait Aggregate {
    fn update(&mut self, value: f64, timestamp: OffsetDateTime, additional_info: Option<&Labels>);

    fn values(&self) -> Vec<MetricValue>;

    fn additional_info(&self) -> Option<Labels> {
        None
    }
}

#[derive(Debug, Clone)]
enum State {
    ActiveMinutes(ActiveMinutes),
    AverageOverTime(AverageOverTime),
    MaxOverTime(MaxOverTime),
    Increase(Increase),
    Rate(Rate),
    IRateMax(IRateMax),
    Info(Info),
}

impl State {
    fn new(kind: AggregatorKind) -> Self {
        match kind {
            AggregatorKind::ActiveMinutes => Self::ActiveMinutes(Default::default()),
            AggregatorKind::AverageOverTime => Self::AverageOverTime(Default::default()),
            AggregatorKind::MaxOverTime => Self::MaxOverTime(Default::default()),
            AggregatorKind::Increase => Self::Increase(Default::default()),
            AggregatorKind::Rate => Self::Rate(Default::default()),
            AggregatorKind::IRateMax => Self::IRateMax(Default::default()),
            AggregatorKind::Info => Self::Info(Default::default()),
        }
    }

    fn as_aggregate(&self) -> &dyn Aggregate {
        match self {
            Self::ActiveMinutes(a) => a,
            Self::AverageOverTime(a) => a,
            Self::MaxOverTime(a) => a,
            Self::Increase(a) => a,
            Self::Rate(a) => a,
            Self::IRateMax(a) => a,
            Self::Info(a) => a,
        }
    }

    fn as_aggregate_mut(&mut self) -> &mut dyn Aggregate {
        match self {
            Self::ActiveMinutes(a) => a,
            Self::AverageOverTime(a) => a,
            Self::MaxOverTime(a) => a,
            Self::Increase(a) => a,
            Self::Rate(a) => a,
            Self::IRateMax(a) => a,
            Self::Info(a) => a,
        }
    }
}

/// Thread-safe aggregator of a single series.
#[derive(Debug)]
pub struct Aggregator {
    kind: AggregatorKind,
    state: Mutex<State>,
}

impl Aggregator {
    pub fn new(kind: AggregatorKind) -> Self {
        Self {
            kind,
            state: Mutex::new(State::new(kind)),
        }
    }

    pub fn kind(&self) -> AggregatorKind {
        self.kind
    }

    pub fn update(&self, value: f64, timestamp: OffsetDateTime, additional_info: Option<&Labels>) {
        self.state
            .lock()
            .as_aggregate_mut()
            .update(value, timestamp, additional_info);
    }

    pub fn values(&self) -> Vec<MetricValue> {
        self.state.lock().as_aggregate().values()
    }

    pub fn additional_info(&self) -> Option<Labels> {
        self.state.lock().as_aggregate().additional_info()
    }
}
