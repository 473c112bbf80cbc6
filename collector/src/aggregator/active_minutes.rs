use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

use super::Aggregate;

/// Records the first and the latest distinct timestamp a series was seen at.
#[derive(Debug, Clone, Default)]
pub struct ActiveMinutes {
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
}

impl Aggregate for ActiveMinutes {
    fn update(&mut self, _value: f64, timestamp: OffsetDateTime, _: Option<&Labels>) {
        match self.start {
            None => self.start = Some(timestamp),
            Some(start) if start != timestamp => self.end = Some(timestamp),
            Some(_) => {}
        }
    }

    fn values(&self) -> Vec<MetricValue> {
        self.start
            .into_iter()
            .chain(self.end)
            .map(|ts| MetricValue::at(1.0, ts))
            .collect()
    }
}
