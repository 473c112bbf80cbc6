use std::{collections::BTreeMap, sync::Arc};

use compact_str::{CompactString, ToCompactString};
use parking_lot::Mutex;
use tally_common::types::{resolution::Resolution, update::UpdateSet};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    clock::SharedClock,
    error::{BucketNotFoundError, GetCollectorError, OutOfRetentionError, StaleUpdateError},
    metric::store::{MetricStore, MetricStoreFactory},
    metrics,
};

const NANOS_PER_MILLI: i128 = 1_000_000;

fn bucket_key(start: OffsetDateTime) -> i64 {
    (start.unix_timestamp_nanos() / NANOS_PER_MILLI) as i64
}

fn bucket_start(key: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(key) * NANOS_PER_MILLI).ok()
}

/// The buckets of one resolution, keyed by bucket start in unix
/// milliseconds.
pub struct ResolutionStore {
    resolution: Resolution,
    spec: CompactString,
    buckets: Mutex<BTreeMap<i64, Arc<MetricStore>>>,
    factory: MetricStoreFactory,
    clock: SharedClock,
}

impl std::fmt::Debug for ResolutionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionStore")
            .field("resolution", &self.resolution)
            .field("buckets", &self.len())
            .finish_non_exhaustive()
    }
}

impl ResolutionStore {
    pub fn new(resolution: Resolution, factory: MetricStoreFactory, clock: SharedClock) -> Self {
        Self {
            resolution,
            spec: resolution.to_compact_string(),
            buckets: Mutex::new(BTreeMap::new()),
            factory,
            clock,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Canonical interval string, e.g. `10m`.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn limit(&self) -> OffsetDateTime {
        self.resolution.limit(self.clock.now())
    }

    /// Route `set` to the bucket covering its timestamp. A set landing
    /// exactly on a bucket boundary is also applied to the preceding bucket,
    /// if that bucket exists, so right-inclusive aggregators can close it.
    pub fn update(&self, set: &UpdateSet) -> Result<(), StaleUpdateError> {
        let limit = self.limit();
        if set.timestamp < limit {
            return Err(StaleUpdateError {
                resolution: self.resolution.interval(),
                timestamp: set.timestamp,
                limit,
            });
        }
        let start = self.resolution.truncate(set.timestamp);
        let (current, previous) = {
            let mut buckets = self.buckets.lock();
            let len = buckets.len();
            let current = Arc::clone(
                buckets
                    .entry(bucket_key(start))
                    .or_insert_with(|| Arc::new((self.factory)())),
            );
            if buckets.len() != len {
                debug!(resolution = %self.spec, %start, "created bucket");
                metrics::set_live_buckets(&self.spec, buckets.len());
            }
            let previous = if start == set.timestamp {
                let previous_start = self.resolution.truncate(set.timestamp - Duration::NANOSECOND);
                buckets.get(&bucket_key(previous_start)).cloned()
            } else {
                None
            };
            (current, previous)
        };
        current.update_set(set);
        if let Some(previous) = previous {
            previous.update_set(set);
        }
        Ok(())
    }

    /// Bucket covering `t`.
    pub fn get_collector(&self, t: OffsetDateTime) -> Result<Arc<MetricStore>, GetCollectorError> {
        let limit = self.limit();
        if t < limit {
            return Err(OutOfRetentionError {
                resolution: self.resolution.interval(),
                timestamp: t,
                limit,
            }
            .into());
        }
        let start = self.resolution.truncate(t);
        self.buckets
            .lock()
            .get(&bucket_key(start))
            .cloned()
            .ok_or_else(|| {
                BucketNotFoundError {
                    resolution: self.resolution.interval(),
                    bucket_start: start,
                }
                .into()
            })
    }

    /// Drop every bucket that starts before the retention limit. Returns the
    /// number of buckets dropped.
    pub fn evict(&self) -> usize {
        let limit = bucket_key(self.limit());
        let mut buckets = self.buckets.lock();
        let kept = buckets.split_off(&limit);
        let evicted = std::mem::replace(&mut *buckets, kept).len();
        if evicted > 0 {
            debug!(resolution = %self.spec, evicted, "evicted buckets");
        }
        metrics::record_eviction(&self.spec, evicted, buckets.len());
        evicted
    }

    /// Starts of every live bucket, oldest first.
    pub fn bucket_starts(&self) -> Vec<OffsetDateTime> {
        self.buckets
            .lock()
            .keys()
            .filter_map(|key| bucket_start(*key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}
