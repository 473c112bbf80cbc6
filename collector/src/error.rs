use std::{path::PathBuf, sync::Arc};

use compact_str::CompactString;
use tally_common::types::interval::Interval;
use time::OffsetDateTime;

use crate::metric::catalog::MetricCollectorId;

#[derive(Debug, Clone, thiserror::Error)]
#[error("collector `{id}` is not registered")]
pub struct UnknownCollectorError {
    pub id: MetricCollectorId,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("collector `{id}` is already registered")]
pub struct DuplicateCollectorError {
    pub id: MetricCollectorId,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("no `{resolution}` bucket starting at {bucket_start}")]
pub struct BucketNotFoundError {
    pub resolution: Interval,
    pub bucket_start: OffsetDateTime,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{timestamp} precedes the `{resolution}` retention limit {limit}")]
pub struct OutOfRetentionError {
    pub resolution: Interval,
    pub timestamp: OffsetDateTime,
    pub limit: OffsetDateTime,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("stale update at {timestamp} for `{resolution}`: retention begins at {limit}")]
pub struct StaleUpdateError {
    pub resolution: Interval,
    pub timestamp: OffsetDateTime,
    pub limit: OffsetDateTime,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("resolution `{0}` is not configured")]
pub struct UnknownResolutionError(pub CompactString);

#[derive(Debug, Clone, thiserror::Error)]
#[error("no valid resolution configured")]
pub struct NoResolutionsError;

#[derive(Debug, Clone, thiserror::Error)]
#[error("query result dropped before delivery")]
pub struct QueryDroppedError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GetCollectorError {
    #[error(transparent)]
    UnknownResolution(#[from] UnknownResolutionError),
    #[error(transparent)]
    OutOfRetention(#[from] OutOfRetentionError),
    #[error(transparent)]
    BucketNotFound(#[from] BucketNotFoundError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    UnknownResolution(#[from] UnknownResolutionError),
    #[error(transparent)]
    OutOfRetention(#[from] OutOfRetentionError),
    #[error(transparent)]
    BucketNotFound(#[from] BucketNotFoundError),
    #[error(transparent)]
    UnknownCollector(#[from] UnknownCollectorError),
    #[error(transparent)]
    NoResolutions(#[from] NoResolutionsError),
    #[error(transparent)]
    Dropped(#[from] QueryDroppedError),
}

impl From<GetCollectorError> for QueryError {
    fn from(e: GetCollectorError) -> Self {
        match e {
            GetCollectorError::UnknownResolution(e) => Self::UnknownResolution(e),
            GetCollectorError::OutOfRetention(e) => Self::OutOfRetention(e),
            GetCollectorError::BucketNotFound(e) => Self::BucketNotFound(e),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalError {
    #[error("io on `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
    #[error("json in `{}`: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: Arc<serde_json::Error>,
    },
}

impl WalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
