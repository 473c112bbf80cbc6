use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

use super::Aggregate;

/// Mean over distinct timestamps. Contributions that share a timestamp are
/// summed into that timestamp's sample.
#[derive(Debug, Clone, Default)]
pub struct AverageOverTime {
    total: f64,
    count: u64,
    last_timestamp: Option<OffsetDateTime>,
}

impl Aggregate for AverageOverTime {
    fn update(&mut self, value: f64, timestamp: OffsetDateTime, _: Option<&Labels>) {
        self.total += value;
        if self.last_timestamp != Some(timestamp) {
            self.count += 1;
            self.last_timestamp = Some(timestamp);
        }
    }

    fn values(&self) -> Vec<MetricValue> {
        if self.count == 0 {
            return Vec::new();
        }
        vec![MetricValue::untimed(self.total / self.count as f64)]
    }
}
