use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

use super::Aggregate;

/// Running maximum. A maximum of zero reads as "no samples".
#[derive(Debug, Clone, Default)]
pub struct MaxOverTime {
    max: f64,
}

impl Aggregate for MaxOverTime {
    fn update(&mut self, value: f64, _: OffsetDateTime, _: Option<&Labels>) {
        if value > self.max {
            self.max = value;
        }
    }

    fn values(&self) -> Vec<MetricValue> {
        if self.max == 0.0 {
            return Vec::new();
        }
        vec![MetricValue::untimed(self.max)]
    }
}
