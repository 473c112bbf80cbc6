//! Scrapers, their concurrent fan-out, and the periodic scheduler that feeds
//! the repository.

pub mod fanout;
pub mod run_state;
pub mod scheduler;

use std::future::Future;

use async_trait::async_trait;
use compact_str::CompactString;
use tally_common::types::update::Update;

use crate::diagnostics::DiagnosticId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ScrapeError(pub String);

impl From<String> for ScrapeError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScrapeError {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// What one scraper produced in one tick. A scraper that partially fails
/// still returns whatever it collected alongside its errors.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutput {
    pub updates: Vec<Update>,
    pub errors: Vec<ScrapeError>,
}

impl ScrapeOutput {
    pub fn ok(updates: Vec<Update>) -> Self {
        Self {
            updates,
            errors: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<ScrapeError>) -> Self {
        Self {
            updates: Vec::new(),
            errors: vec![error.into()],
        }
    }
}

/// A pluggable source of observations. Observations carry no timestamp; the
/// scheduler stamps each tick's batch.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn name(&self) -> &str;

    /// Diagnostic this scraper reports into.
    fn diagnostic(&self) -> Option<DiagnosticId> {
        None
    }

    async fn scrape(&self) -> ScrapeOutput;
}

/// A [`Scraper`] backed by an async closure.
pub struct FnScraper<F> {
    name: CompactString,
    diagnostic: Option<DiagnosticId>,
    f: F,
}

impl<F> std::fmt::Debug for FnScraper<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnScraper")
            .field("name", &self.name)
            .field("diagnostic", &self.diagnostic)
            .finish_non_exhaustive()
    }
}

impl<F, Fut> FnScraper<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ScrapeOutput> + Send,
{
    pub fn new(name: impl Into<CompactString>, f: F) -> Self {
        Self {
            name: name.into(),
            diagnostic: None,
            f,
        }
    }

    pub fn with_diagnostic(self, diagnostic: DiagnosticId) -> Self {
        Self {
            diagnostic: Some(diagnostic),
            ..self
        }
    }
}

#[async_trait]
impl<F, Fut> Scraper for FnScraper<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ScrapeOutput> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn diagnostic(&self) -> Option<DiagnosticId> {
        self.diagnostic
    }

    async fn scrape(&self) -> ScrapeOutput {
        (self.f)().await
    }
}
