//! Awaitable query results.
//!
//! A [`QueryFuture`] is either already resolved or waits for a single
//! delivery over a oneshot channel. Callers that issue a group of queries can
//! attach a shared [`ErrorCollector`] so failures accumulate in one place
//! instead of short-circuiting the group.

use std::sync::Arc;

use parking_lot::Mutex;
use tally_common::types::metric::MetricResult;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{QueryDroppedError, QueryError};

pub type QueryOutcome = Result<Vec<MetricResult>, QueryError>;

/// Producer half of a pending [`QueryFuture`].
pub type QuerySender = oneshot::Sender<QueryOutcome>;

#[derive(Debug, Clone, Default)]
pub struct ErrorCollector(Arc<Mutex<Vec<QueryError>>>);

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, error: QueryError) {
        self.0.lock().push(error);
    }

    pub fn errors(&self) -> Vec<QueryError> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[derive(Debug)]
enum Source {
    Ready(QueryOutcome),
    Pending(oneshot::Receiver<QueryOutcome>),
}

#[derive(Debug)]
pub struct QueryFuture {
    source: Source,
    errors: Option<ErrorCollector>,
}

impl QueryFuture {
    pub fn resolved(results: Vec<MetricResult>) -> Self {
        Self::ready(Ok(results))
    }

    pub fn ready(outcome: QueryOutcome) -> Self {
        Self {
            source: Source::Ready(outcome),
            errors: None,
        }
    }

    pub fn channel() -> (QuerySender, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                source: Source::Pending(rx),
                errors: None,
            },
        )
    }

    pub fn with_error_collector(self, errors: ErrorCollector) -> Self {
        Self {
            errors: Some(errors),
            ..self
        }
    }

    /// The query outcome, whether or not an error collector is attached.
    pub async fn resolve(self) -> QueryOutcome {
        match self.source {
            Source::Ready(outcome) => outcome,
            Source::Pending(rx) => rx.await.unwrap_or_else(|_| Err(QueryDroppedError.into())),
        }
    }

    /// The query's results. A failure yields no results and is appended to
    /// the attached error collector, if any.
    pub async fn await_result(mut self) -> Vec<MetricResult> {
        let errors = self.errors.take();
        match self.resolve().await {
            Ok(results) => results,
            Err(error) => {
                match errors {
                    Some(errors) => errors.push(error),
                    None => debug!(%error, "discarding query error"),
                }
                Vec::new()
            }
        }
    }
}
