use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

use super::Aggregate;

/// Keeps the latest descriptive labels of a series; its value is always 1.
#[derive(Debug, Clone, Default)]
pub struct Info {
    additional_info: Option<Labels>,
}

impl Aggregate for Info {
    fn update(&mut self, _value: f64, _: OffsetDateTime, additional_info: Option<&Labels>) {
        self.additional_info = additional_info.cloned();
    }

    fn values(&self) -> Vec<MetricValue> {
        vec![MetricValue::untimed(1.0)]
    }

    fn additional_info(&self) -> Option<Labels> {
        self.additional_info.clone()
    }
}
