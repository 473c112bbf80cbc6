use std::sync::Arc;

use tally_collector::{clock::ManualClock, repository::wal::Wal};
use time::{Duration, macros::datetime};

use super::common::*;

const CLUSTER: &str = "cluster-one";

#[tokio::test]
async fn test_restart_replays_identical_buckets() {
    let root = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(datetime!(2025-05-03 12:05 UTC));

    let before = {
        let wal = Wal::new(
            root.path(),
            CLUSTER,
            create_repository(&default_resolutions(), &clock),
        );
        let ticks = [
            (datetime!(2025-05-03 11:40 UTC), 100.0, 1.5),
            (datetime!(2025-05-03 11:50 UTC), 130.0, 2.5),
            (datetime!(2025-05-03 12:00 UTC), 190.0, 0.5),
        ];
        for (ts, cpu_seconds, cost) in ticks {
            wal.update(&update_set(
                ts,
                vec![
                    update(
                        "kube_pod_container_status_running",
                        &[("namespace", "ns"), ("pod", "p"), ("uid", "u")],
                        1.0,
                    ),
                    update(
                        "container_cpu_usage_seconds_total",
                        &[
                            ("namespace", "ns"),
                            ("pod", "p"),
                            ("container", "app"),
                            ("node", "n1"),
                            ("instance", "i"),
                        ],
                        cpu_seconds,
                    ),
                    update(
                        "node_cpu_hourly_cost",
                        &[("node", "n1"), ("instance_type", "m5.large"), ("provider_id", "i-1")],
                        cost,
                    ),
                    update("kube_node_labels", &[("node", "n1")], 1.0).with_additional_info(
                        tally_common::types::labels::labels([("label_zone", "a")]),
                    ),
                ],
            ))
            .await;
        }
        snapshot(wal.repository())
    };
    assert!(!before.is_empty());

    let restored = Wal::new(
        root.path(),
        CLUSTER,
        create_repository(&default_resolutions(), &clock),
    );
    assert_eq!(restored.restore().await.unwrap(), 3);
    assert_eq!(snapshot(restored.repository()), before);
}

#[tokio::test]
async fn test_restart_keeps_sets_sharing_a_timestamp() {
    let root = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(datetime!(2025-05-03 12:05 UTC));
    let ts = datetime!(2025-05-03 12:00 UTC);

    let before = {
        let wal = Wal::new(
            root.path(),
            CLUSTER,
            create_repository(&default_resolutions(), &clock),
        );
        for node in ["n1", "n2"] {
            wal.update(&update_set(ts, vec![update("kube_node_labels", &[("node", node)], 1.0)]))
                .await;
        }
        snapshot(wal.repository())
    };
    let series: usize = before.values().map(Vec::len).sum();
    assert_eq!(series, 2 * default_resolutions().len());

    let restored = Wal::new(
        root.path(),
        CLUSTER,
        create_repository(&default_resolutions(), &clock),
    );
    assert_eq!(restored.restore().await.unwrap(), 2);
    assert_eq!(snapshot(restored.repository()), before);
}

#[tokio::test]
async fn test_restore_ignores_entries_outside_every_retention() {
    let root = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(datetime!(2025-05-03 12:05 UTC));
    let configs = [tally_common::types::resolution::ResolutionConfig::new("1h", 2)];

    let writer = Wal::new(root.path(), CLUSTER, create_repository(&configs, &clock));
    for hours_ago in [5, 1, 0] {
        let ts = datetime!(2025-05-03 12:00 UTC) - Duration::hours(hours_ago);
        clock.set(ts);
        writer
            .update(&update_set(ts, vec![update("kube_node_labels", &[("node", "n1")], 1.0)]))
            .await;
    }

    let reader = Wal::new(root.path(), CLUSTER, create_repository(&configs, &clock));
    assert_eq!(reader.restore().await.unwrap(), 2);
    assert_eq!(
        reader.repository().stores()[0].bucket_starts(),
        [datetime!(2025-05-03 11:00 UTC), datetime!(2025-05-03 12:00 UTC)]
    );

    assert_eq!(reader.clean().await.unwrap(), 1);
    assert_eq!(std::fs::read_dir(reader.dir()).unwrap().count(), 2);
}

#[tokio::test]
async fn test_unwritable_wal_keeps_memory_authoritative() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("blocked");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let clock = ManualClock::new(datetime!(2025-05-03 12:05 UTC));
    let wal = Arc::new(Wal::new(
        &blocker,
        CLUSTER,
        create_repository(&default_resolutions(), &clock),
    ));

    wal.update(&update_set(
        datetime!(2025-05-03 12:00 UTC),
        vec![update("kube_node_labels", &[("node", "n1")], 1.0)],
    ))
    .await;

    assert!(
        wal.repository()
            .get_collector("10m", datetime!(2025-05-03 12:00 UTC))
            .is_ok()
    );
}
