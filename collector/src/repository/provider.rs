use std::sync::Arc;

use tally_common::types::resolution::Resolution;
use time::{Duration, OffsetDateTime};

use super::Repository;
use crate::{
    error::QueryError,
    metric::{catalog::MetricCollectorId, store::MetricStore},
    query::QueryFuture,
};

/// Resolution whose interval is closest to `window`. Ties go to the earlier
/// resolution.
pub fn closest_resolution(
    resolutions: impl IntoIterator<Item = Resolution>,
    window: Duration,
) -> Option<Resolution> {
    resolutions
        .into_iter()
        .min_by_key(|r| (window - r.duration()).abs())
}

/// Answers `[start, end]` queries from the resolution that best matches the
/// window length.
#[derive(Debug, Clone)]
pub struct StoreProvider {
    repository: Arc<Repository>,
}

impl StoreProvider {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    /// Chosen resolution and the start of its bucket covering `start`.
    pub fn select(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> (Resolution, OffsetDateTime) {
        let resolution = closest_resolution(self.repository.resolutions(), end - start)
            .expect("invariant violation: repository without resolutions");
        (resolution, resolution.truncate(start))
    }

    pub fn get_store(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<(OffsetDateTime, Arc<MetricStore>), QueryError> {
        let (resolution, bucket_start) = self.select(start, end);
        let store = self
            .repository
            .get_collector(&resolution.to_string(), bucket_start)?;
        Ok((bucket_start, store))
    }

    pub fn query(
        &self,
        id: MetricCollectorId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> QueryFuture {
        QueryFuture::ready(
            self.get_store(start, end)
                .and_then(|(_, store)| Ok(store.query(id)?)),
        )
    }
}
