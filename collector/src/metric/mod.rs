//! Metric collectors and the per-bucket store that routes observations to
//! them.

pub mod catalog;
pub mod store;

use std::{fmt, hash::Hasher};

use compact_str::CompactString;
use dashmap::DashMap;
use fnv::FnvHasher;
use itertools::Itertools;
use tally_common::types::{
    labels::{Labels, label_value},
    metric::MetricResult,
};
use time::OffsetDateTime;

use self::catalog::{LabelFilter, MetricCollectorId};
use crate::aggregator::{Aggregator, AggregatorKind};

const FIELD_SEPARATOR: u8 = 0xff;

/// FNV-1a over the values of `keys` in `labels`, in order. Missing keys
/// contribute an empty value.
pub fn fingerprint<'a>(labels: &Labels, keys: impl IntoIterator<Item = &'a str>) -> u64 {
    let mut hasher = FnvHasher::default();
    for key in keys {
        hasher.write(label_value(labels, key).as_bytes());
        hasher.write_u8(FIELD_SEPARATOR);
    }
    hasher.finish()
}

#[derive(Debug)]
struct Series {
    name: CompactString,
    labels: Labels,
    aggregator: Aggregator,
}

/// Partitions observations of one raw metric into series by identity labels
/// and folds each series with its own aggregator.
pub struct MetricCollector {
    id: MetricCollectorId,
    metric_name: CompactString,
    identity_labels: Vec<CompactString>,
    kind: AggregatorKind,
    filter: Option<LabelFilter>,
    series: DashMap<u64, Series>,
}

impl fmt::Debug for MetricCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricCollector")
            .field("id", &self.id)
            .field("metric_name", &self.metric_name)
            .field("identity_labels", &self.identity_labels)
            .field("kind", &self.kind)
            .field("filtered", &self.filter.is_some())
            .field("series", &self.series.len())
            .finish()
    }
}

impl MetricCollector {
    pub fn new<L>(
        id: MetricCollectorId,
        metric_name: impl Into<CompactString>,
        identity_labels: impl IntoIterator<Item = L>,
        kind: AggregatorKind,
        filter: Option<LabelFilter>,
    ) -> Self
    where
        L: Into<CompactString>,
    {
        Self {
            id,
            metric_name: metric_name.into(),
            identity_labels: identity_labels.into_iter().map(Into::into).collect(),
            kind,
            filter,
            series: DashMap::new(),
        }
    }

    pub fn id(&self) -> MetricCollectorId {
        self.id
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn kind(&self) -> AggregatorKind {
        self.kind
    }

    pub fn identity_labels(&self) -> &[CompactString] {
        &self.identity_labels
    }

    /// Number of distinct series seen so far.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn update(
        &self,
        labels: &Labels,
        value: f64,
        timestamp: OffsetDateTime,
        additional_info: Option<&Labels>,
    ) {
        if let Some(filter) = self.filter
            && !filter(labels)
        {
            return;
        }
        let key = fingerprint(labels, self.identity_labels.iter().map(CompactString::as_str));
        self.series
            .entry(key)
            .or_insert_with(|| self.new_series(labels))
            .aggregator
            .update(value, timestamp, additional_info);
    }

    fn new_series(&self, labels: &Labels) -> Series {
        let identity: Labels = self
            .identity_labels
            .iter()
            .map(|key| (key.clone(), label_value(labels, key).into()))
            .collect();
        let name = format!(
            "{}{{{}}}",
            self.metric_name,
            self.identity_labels
                .iter()
                .map(|key| format!("\"{key}\"=\"{}\"", label_value(&identity, key)))
                .join(",")
        );
        Series {
            name: name.into(),
            labels: identity,
            aggregator: Aggregator::new(self.kind),
        }
    }

    /// Condensed output of every series, ordered by synthetic name.
    pub fn get(&self) -> Vec<MetricResult> {
        self.series
            .iter()
            .map(|entry| {
                let series = entry.value();
                let mut metric_labels = series.aggregator.additional_info().unwrap_or_default();
                metric_labels.extend(
                    series
                        .labels
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                MetricResult {
                    name: series.name.clone(),
                    metric_labels,
                    values: series.aggregator.values(),
                }
            })
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }
}
