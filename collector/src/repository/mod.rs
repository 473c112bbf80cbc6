//! Multi-resolution bucket storage.

pub mod bgtasks;
pub mod bucket;
pub mod provider;
pub mod wal;

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tally_common::types::{
    interval::Interval,
    resolution::{Resolution, ResolutionConfig},
    update::UpdateSet,
};
use time::OffsetDateTime;
use tracing::{debug, warn};

use self::bucket::ResolutionStore;
use crate::{
    clock::SharedClock,
    error::{GetCollectorError, NoResolutionsError, UnknownResolutionError},
    metric::store::{MetricStore, MetricStoreFactory},
    metrics,
};

/// Sink for timestamped update sets.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn update(&self, set: UpdateSet);
}

/// Every configured resolution and its buckets.
#[derive(Debug)]
pub struct Repository {
    stores: Vec<Arc<ResolutionStore>>,
    clock: SharedClock,
}

impl Repository {
    /// Build one bucket store per valid resolution. Invalid and repeated
    /// resolutions are skipped; at least one must remain.
    pub fn new(
        configs: &[ResolutionConfig],
        factory: MetricStoreFactory,
        clock: SharedClock,
    ) -> Result<Self, NoResolutionsError> {
        let mut stores: Vec<Arc<ResolutionStore>> = Vec::with_capacity(configs.len());
        for config in configs {
            let resolution = match Resolution::try_from(config) {
                Ok(resolution) => resolution,
                Err(error) => {
                    warn!(interval = %config.interval, %error, "skipping resolution");
                    continue;
                }
            };
            if stores
                .iter()
                .any(|s| s.resolution().interval().same_lattice(&resolution.interval()))
            {
                warn!(interval = %config.interval, "skipping duplicate resolution");
                continue;
            }
            stores.push(Arc::new(ResolutionStore::new(
                resolution,
                Arc::clone(&factory),
                Arc::clone(&clock),
            )));
        }
        if stores.is_empty() {
            return Err(NoResolutionsError);
        }
        Ok(Self { stores, clock })
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn stores(&self) -> &[Arc<ResolutionStore>] {
        &self.stores
    }

    pub fn resolutions(&self) -> impl Iterator<Item = Resolution> + '_ {
        self.stores.iter().map(|s| s.resolution())
    }

    pub fn store(&self, interval: &str) -> Result<&Arc<ResolutionStore>, UnknownResolutionError> {
        let unknown = || UnknownResolutionError(interval.into());
        let interval = interval.parse::<Interval>().map_err(|_| unknown())?;
        self.stores
            .iter()
            .find(|s| s.resolution().interval().same_lattice(&interval))
            .ok_or_else(unknown)
    }

    /// Apply `set` to every resolution. Resolutions for which the set is
    /// already out of retention drop it.
    pub fn update(&self, set: &UpdateSet) {
        for store in &self.stores {
            if let Err(error) = store.update(set) {
                debug!(%error, "dropping stale update set");
                metrics::record_stale_update();
            }
        }
    }

    pub fn get_collector(
        &self,
        interval: &str,
        t: OffsetDateTime,
    ) -> Result<Arc<MetricStore>, GetCollectorError> {
        self.store(interval)?.get_collector(t)
    }

    /// Live bucket starts per resolution, in configuration order.
    pub fn coverage(&self) -> IndexMap<String, Vec<OffsetDateTime>> {
        self.stores
            .iter()
            .map(|s| (s.spec().to_owned(), s.bucket_starts()))
            .collect()
    }

    /// Earliest retention limit across resolutions: the oldest instant any
    /// live bucket may still cover.
    pub fn min_limit(&self) -> OffsetDateTime {
        self.stores
            .iter()
            .map(|s| s.limit())
            .min()
            .expect("invariant violation: repository without resolutions")
    }

    pub fn evict(&self) -> usize {
        self.stores.iter().map(|s| s.evict()).sum()
    }
}

#[async_trait]
impl Updater for Repository {
    async fn update(&self, set: UpdateSet) {
        Repository::update(self, &set);
    }
}
