use std::{future::Future, sync::Arc};

use tally_common::types::update::Update;
use tokio::task::JoinSet;
use tracing::warn;

use super::Scraper;
use crate::events::{EventBus, ScrapeEvent};

/// Run every task concurrently and collect the results in completion order.
/// A task that panics contributes nothing.
pub async fn concurrent_collect<T, F, Fut>(tasks: impl IntoIterator<Item = F>) -> Vec<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(task());
    }
    let mut results = Vec::with_capacity(set.len());
    while let Some(res) = set.join_next().await {
        match res {
            Ok(result) => results.push(result),
            Err(error) => warn!(%error, "concurrent task failed"),
        }
    }
    results
}

/// Scrape every source in parallel, publish one event per scraper, and
/// return all updates. Ordering across scrapers is unspecified.
pub async fn scrape_all(scrapers: &[Arc<dyn Scraper>], bus: &EventBus) -> Vec<Update> {
    let outputs = concurrent_collect(scrapers.iter().map(|scraper| {
        let scraper = Arc::clone(scraper);
        move || async move {
            let output = scraper.scrape().await;
            (scraper, output)
        }
    }))
    .await;

    let mut updates = Vec::with_capacity(outputs.iter().map(|(_, o)| o.updates.len()).sum());
    for (scraper, output) in outputs {
        for error in &output.errors {
            warn!(scraper = scraper.name(), %error, "scrape error");
        }
        let success = output.updates.len();
        let fail = output.errors.len();
        bus.publish(ScrapeEvent {
            scraper: scraper.name().into(),
            diagnostic: scraper.diagnostic(),
            total: success + fail,
            success,
            fail,
            errors: output.errors.iter().map(ToString::to_string).collect(),
        });
        updates.extend(output.updates);
    }
    updates
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tally_common::types::labels::labels;

    use super::*;
    use crate::scrape::{FnScraper, ScrapeOutput};

    #[tokio::test]
    async fn collects_in_completion_order() {
        let results = concurrent_collect([30u64, 10, 20].map(|delay| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay
            }
        }))
        .await;
        assert_eq!(results, [10, 20, 30]);
    }

    #[tokio::test]
    async fn panicking_task_is_skipped() {
        let results = concurrent_collect([false, true, false].map(|panics| {
            move || async move {
                assert!(!panics, "scraper exploded");
                1
            }
        }))
        .await;
        assert_eq!(results, [1, 1]);
    }

    #[tokio::test]
    async fn concatenates_updates_and_reports_failures() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let scrapers: Vec<Arc<dyn Scraper>> = vec![
            Arc::new(FnScraper::new("nodes", || async {
                ScrapeOutput::ok(vec![
                    Update::new("kube_node_labels", labels([("node", "a")]), 1.0),
                    Update::new("kube_node_labels", labels([("node", "b")]), 1.0),
                ])
            })),
            Arc::new(FnScraper::new("broken", || async {
                ScrapeOutput::failed("connection refused")
            })),
        ];
        let updates = scrape_all(&scrapers, &bus).await;
        assert_eq!(updates.len(), 2);

        let mut events = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        events.sort_by(|a, b| a.scraper.cmp(&b.scraper));
        assert_eq!(events[0].scraper, "broken");
        assert_eq!(events[0].errors, ["connection refused"]);
        assert_eq!((events[1].success, events[1].fail), (2, 0));
    }
}
