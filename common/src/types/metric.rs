use std::collections::BTreeMap;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::labels::Labels;

/// One condensed point of an aggregated series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
}

impl MetricValue {
    pub fn untimed(value: f64) -> Self {
        Self {
            value,
            timestamp: None,
        }
    }

    pub fn at(value: f64, timestamp: OffsetDateTime) -> Self {
        Self {
            value,
            timestamp: Some(timestamp),
        }
    }
}

/// The aggregated output of one series within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    /// Synthetic `metric{"k"="v",...}` name, used for ordering and logging.
    pub name: CompactString,
    pub metric_labels: Labels,
    pub values: Vec<MetricValue>,
}

/// Generic, label-typed view of a [`MetricResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub metric: BTreeMap<String, serde_json::Value>,
    /// `(unix seconds, value)` pairs.
    pub values: Vec<(f64, f64)>,
}

impl MetricResult {
    /// Convert into a [`QueryResult`]. Values without a timestamp are placed
    /// at `fallback`, normally the start of the bucket they came from.
    pub fn into_query_result(self, fallback: OffsetDateTime) -> QueryResult {
        let metric = self
            .metric_labels
            .into_iter()
            .map(|(k, v)| (k.into_string(), serde_json::Value::String(v.into_string())))
            .collect();
        let values = self
            .values
            .into_iter()
            .map(|v| (unix_seconds(v.timestamp.unwrap_or(fallback)), v.value))
            .collect();
        QueryResult { metric, values }
    }
}

fn unix_seconds(t: OffsetDateTime) -> f64 {
    t.unix_timestamp_nanos() as f64 / 1e9
}
