use std::{sync::Arc, time::Instant};

use tally_common::types::{interval::Interval, update::UpdateSet};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{Scraper, fanout::scrape_all, run_state::RunState};
use crate::{
    clock::{self, SharedClock},
    events::EventBus,
    metrics,
    repository::Updater,
};

struct Inner {
    interval: Interval,
    scrapers: Vec<Arc<dyn Scraper>>,
    updater: Arc<dyn Updater>,
    bus: EventBus,
    clock: SharedClock,
    state: RunState,
}

/// Runs every scraper once per interval boundary and hands the combined,
/// uniformly timestamped batch to an [`Updater`].
#[derive(Clone)]
pub struct ScrapeController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ScrapeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeController")
            .field("interval", &self.inner.interval)
            .field("scrapers", &self.inner.scrapers.len())
            .field("status", &self.inner.state.status())
            .finish()
    }
}

impl ScrapeController {
    pub fn new(
        interval: Interval,
        scrapers: Vec<Arc<dyn Scraper>>,
        updater: Arc<dyn Updater>,
        bus: EventBus,
        clock: SharedClock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval,
                scrapers,
                updater,
                bus,
                clock,
                state: RunState::new(),
            }),
        }
    }

    pub fn run_state(&self) -> &RunState {
        &self.inner.state
    }

    /// Spawn the scrape loop. False if it is already running or has not yet
    /// reset from a previous stop.
    pub fn start(&self) -> bool {
        if !self.inner.state.start() {
            return false;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.run());
        true
    }

    /// Ask the loop to exit after any in-flight scrape. False if not running.
    pub fn stop(&self) -> bool {
        self.inner.state.stop()
    }

    pub async fn wait_for_reset(&self) {
        self.inner.state.wait_for_reset().await;
    }

    /// Run one scrape stamped with `timestamp`, outside the loop. Returns the
    /// number of updates handed on.
    pub async fn scrape_once(&self, timestamp: OffsetDateTime) -> usize {
        self.inner.scrape_at(timestamp).await
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        let on_stop = self.state.on_stop();
        tokio::pin!(on_stop);
        let mut next = self.interval.truncate(self.clock.now());
        info!(interval = %self.interval, scrapers = self.scrapers.len(), "scrape loop started");
        loop {
            tokio::select! {
                biased;
                _ = &mut on_stop => {
                    self.state.reset();
                    info!("scrape loop stopped");
                    return;
                }
                _ = tokio::time::sleep(clock::until(self.clock.now(), next)) => {
                    self.scrape_at(next).await;
                    next = self.interval.add(self.interval.truncate(self.clock.now()), 1);
                }
            }
        }
    }

    #[instrument(skip(self), fields(%timestamp))]
    async fn scrape_at(&self, timestamp: OffsetDateTime) -> usize {
        let started = Instant::now();
        let updates = scrape_all(&self.scrapers, &self.bus).await;
        let count = updates.len();
        metrics::observe_scrape(started.elapsed(), count);
        self.updater.update(UpdateSet::new(timestamp, updates)).await;
        count
    }
}
