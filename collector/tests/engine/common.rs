use std::{collections::BTreeMap, sync::Arc};

use tally_collector::{
    aggregator::AggregatorKind,
    clock::ManualClock,
    metric::{
        MetricCollector,
        catalog::{self, MetricCollectorId},
        store::{MetricStore, MetricStoreFactory},
    },
    repository::Repository,
};
use tally_common::types::{
    labels::labels,
    metric::MetricResult,
    resolution::ResolutionConfig,
    update::{Update, UpdateSet},
};
use time::OffsetDateTime;

pub fn default_resolutions() -> Vec<ResolutionConfig> {
    vec![
        ResolutionConfig::new("10m", 36),
        ResolutionConfig::new("1h", 49),
        ResolutionConfig::new("1d", 15),
    ]
}

pub fn create_repository(configs: &[ResolutionConfig], clock: &ManualClock) -> Arc<Repository> {
    create_repository_with(configs, catalog::store_factory(), clock)
}

pub fn create_repository_with(
    configs: &[ResolutionConfig],
    factory: MetricStoreFactory,
    clock: &ManualClock,
) -> Arc<Repository> {
    Arc::new(Repository::new(configs, factory, Arc::new(clock.clone())).unwrap())
}

/// A bucket holding one average collector over `test_metric`, keyed by the
/// `test` label.
pub fn test_metric_factory() -> MetricStoreFactory {
    Arc::new(|| {
        let mut store = MetricStore::new();
        store
            .register(MetricCollector::new(
                MetricCollectorId::CpuAllocation,
                "test_metric",
                ["test"],
                AggregatorKind::AverageOverTime,
                None,
            ))
            .unwrap();
        store
    })
}

pub fn update(name: &str, pairs: &[(&str, &str)], value: f64) -> Update {
    Update::new(name, labels(pairs.iter().copied()), value)
}

pub fn update_set(timestamp: OffsetDateTime, updates: Vec<Update>) -> UpdateSet {
    UpdateSet::new(timestamp, updates)
}

pub type Snapshot = BTreeMap<(String, OffsetDateTime, MetricCollectorId), Vec<MetricResult>>;

/// Query output of every collector in every live bucket.
pub fn snapshot(repository: &Repository) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for store in repository.stores() {
        for start in store.bucket_starts() {
            let bucket = store.get_collector(start).unwrap();
            for id in bucket.ids() {
                let results = bucket.query(id).unwrap();
                if !results.is_empty() {
                    snapshot.insert((store.spec().to_owned(), start, id), results);
                }
            }
        }
    }
    snapshot
}
