use std::{collections::HashMap, sync::Arc};

use compact_str::CompactString;
use indexmap::IndexMap;
use tally_common::types::{labels::Labels, metric::MetricResult, update::UpdateSet};
use time::OffsetDateTime;

use super::{MetricCollector, catalog::MetricCollectorId};
use crate::error::{DuplicateCollectorError, UnknownCollectorError};

/// Builds an empty bucket with the collector catalogue registered.
pub type MetricStoreFactory = Arc<dyn Fn() -> MetricStore + Send + Sync>;

/// The collectors of one bucket, indexed by id and by the raw metric name
/// they subscribe to.
#[derive(Debug, Default)]
pub struct MetricStore {
    collectors: IndexMap<MetricCollectorId, Arc<MetricCollector>>,
    by_metric: HashMap<CompactString, Vec<Arc<MetricCollector>>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: MetricCollector) -> Result<(), DuplicateCollectorError> {
        let id = collector.id();
        if self.collectors.contains_key(&id) {
            return Err(DuplicateCollectorError { id });
        }
        let collector = Arc::new(collector);
        self.by_metric
            .entry(collector.metric_name().into())
            .or_default()
            .push(Arc::clone(&collector));
        self.collectors.insert(id, collector);
        Ok(())
    }

    pub fn unregister(&mut self, id: MetricCollectorId) {
        let Some(collector) = self.collectors.shift_remove(&id) else {
            return;
        };
        if let Some(subscribers) = self.by_metric.get_mut(collector.metric_name()) {
            subscribers.retain(|c| c.id() != id);
            if subscribers.is_empty() {
                self.by_metric.remove(collector.metric_name());
            }
        }
    }

    pub fn collector(&self, id: MetricCollectorId) -> Option<&Arc<MetricCollector>> {
        self.collectors.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = MetricCollectorId> + '_ {
        self.collectors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn query(&self, id: MetricCollectorId) -> Result<Vec<MetricResult>, UnknownCollectorError> {
        self.collectors
            .get(&id)
            .map(|collector| collector.get())
            .ok_or(UnknownCollectorError { id })
    }

    /// Forward one observation to every collector subscribed to
    /// `metric_name`. Unsubscribed metrics are dropped.
    pub fn update(
        &self,
        metric_name: &str,
        labels: &Labels,
        value: f64,
        timestamp: OffsetDateTime,
        additional_info: Option<&Labels>,
    ) {
        let Some(subscribers) = self.by_metric.get(metric_name) else {
            return;
        };
        for collector in subscribers {
            collector.update(labels, value, timestamp, additional_info);
        }
    }

    /// Apply every observation of `set` at the set's timestamp.
    pub fn update_set(&self, set: &UpdateSet) {
        for update in &set.updates {
            self.update(
                &update.name,
                &update.labels,
                update.value,
                set.timestamp,
                update.additional_info.as_ref(),
            );
        }
    }
}
