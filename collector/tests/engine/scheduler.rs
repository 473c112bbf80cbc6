use std::{sync::Arc, time::Duration};

use tally_collector::{
    clock::{ManualClock, TokioClock},
    events::EventBus,
    metric::catalog::MetricCollectorId,
    repository::wal::Wal,
    scrape::{FnScraper, ScrapeOutput, Scraper, run_state::RunStatus, scheduler::ScrapeController},
};
use time::macros::datetime;
use tokio::sync::Notify;

use super::common::*;

#[tokio::test(start_paused = true)]
async fn test_stop_during_scrape_resets_and_restarts() {
    let started = Arc::new(Notify::new());
    let scraper: Arc<dyn Scraper> = Arc::new(FnScraper::new("slow", {
        let started = Arc::clone(&started);
        move || {
            let started = Arc::clone(&started);
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_secs(5)).await;
                ScrapeOutput::ok(vec![update("kube_node_labels", &[("node", "n1")], 1.0)])
            }
        }
    }));
    let clock = ManualClock::new(datetime!(2025-05-03 00:00:10 UTC));
    let repository = create_repository(&default_resolutions(), &clock);
    let controller = ScrapeController::new(
        "30s".parse().unwrap(),
        vec![scraper],
        repository.clone(),
        EventBus::new(),
        Arc::new(TokioClock::starting_at(datetime!(2025-05-03 00:00:10 UTC))),
    );
    let on_stop = controller.run_state().on_stop();

    assert!(controller.start());
    started.notified().await;
    assert!(controller.stop());
    assert_eq!(controller.run_state().status(), RunStatus::Stopping);

    tokio::time::timeout(Duration::from_secs(1), on_stop)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(10), controller.wait_for_reset())
        .await
        .unwrap();
    assert_eq!(controller.run_state().status(), RunStatus::Idle);

    // the in-flight scrape completed before the loop exited
    let bucket = repository
        .get_collector("10m", datetime!(2025-05-03 00:00 UTC))
        .unwrap();
    assert_eq!(bucket.query(MetricCollectorId::NodeLabels).unwrap().len(), 1);

    assert!(controller.start());
    assert!(controller.stop());
    controller.wait_for_reset().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticks_feed_wal_and_repository() {
    let root = tempfile::tempdir().unwrap();
    let base = datetime!(2025-05-03 00:00:05 UTC);
    let clock = ManualClock::new(base + time::Duration::minutes(1));
    let wal = Arc::new(Wal::new(
        root.path(),
        "cluster-one",
        create_repository(&default_resolutions(), &clock),
    ));
    let scraper: Arc<dyn Scraper> = Arc::new(FnScraper::new("static", || async {
        ScrapeOutput::ok(vec![update(
            "kube_node_status_capacity_cpu_cores",
            &[("node", "n1")],
            2.0,
        )])
    }));
    let controller = ScrapeController::new(
        "30s".parse().unwrap(),
        vec![scraper],
        wal.clone(),
        EventBus::new(),
        Arc::new(TokioClock::starting_at(base)),
    );

    assert!(controller.start());
    tokio::time::sleep(Duration::from_secs(40)).await;
    controller.stop();
    controller.wait_for_reset().await;

    let mut files: Vec<_> = std::fs::read_dir(wal.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    files.sort();
    assert_eq!(
        files,
        [
            "20250503T000000000000000Z.json",
            "20250503T000030000000000Z.json"
        ]
    );
    let bucket = wal
        .repository()
        .get_collector("10m", datetime!(2025-05-03 00:00 UTC))
        .unwrap();
    assert_eq!(bucket.query(MetricCollectorId::NodeCpuCapacity).unwrap().len(), 1);
}
