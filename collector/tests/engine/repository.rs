use proptest::prelude::*;
use tally_collector::{
    clock::ManualClock,
    error::GetCollectorError,
    metric::catalog::MetricCollectorId,
};
use tally_common::types::{
    labels::{Labels, labels},
    metric::MetricValue,
    resolution::{Resolution, ResolutionConfig},
    update::Update,
};
use time::{Duration, OffsetDateTime, macros::datetime};

use super::common::*;

#[test]
fn test_three_distinct_ticks_average_in_one_bucket() {
    let day = datetime!(2025-05-03 00:00 UTC);
    let clock = ManualClock::new(day + Duration::hours(20));
    let repository =
        create_repository_with(&[ResolutionConfig::new("1d", 3)], test_metric_factory(), &clock);

    for (hours, value) in [(0, 1.0), (12, 2.0), (18, 3.0)] {
        repository.update(&update_set(
            day + Duration::hours(hours),
            vec![update("test_metric", &[("test", "test")], value)],
        ));
    }

    let bucket = repository.get_collector("1d", day).unwrap();
    let results = bucket.query(MetricCollectorId::CpuAllocation).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metric_labels, labels([("test", "test")]));
    assert_eq!(results[0].values, vec![MetricValue::untimed(2.0)]);
}

#[test]
fn test_retention_evicts_oldest_day() {
    let t = datetime!(2025-05-03 06:00 UTC);
    let clock = ManualClock::new(t - Duration::days(2));
    let repository = create_repository(&[ResolutionConfig::new("1d", 2)], &clock);

    for days_ago in [2, 1, 0] {
        let ts = t - Duration::days(days_ago);
        clock.set(ts);
        repository.update(&update_set(
            ts,
            vec![update("kube_node_labels", &[("node", "n1")], 1.0)],
        ));
    }
    assert_eq!(repository.stores()[0].len(), 3);
    assert_eq!(repository.evict(), 1);

    assert!(matches!(
        repository.get_collector("1d", t - Duration::days(2)),
        Err(GetCollectorError::OutOfRetention(_) | GetCollectorError::BucketNotFound(_))
    ));
    assert!(repository.get_collector("1d", t - Duration::days(1)).is_ok());
    assert!(repository.get_collector("1d", t).is_ok());
}

#[test]
fn test_boundary_sample_closes_previous_hour() {
    let clock = ManualClock::new(datetime!(2025-05-03 12:05 UTC));
    let repository = create_repository(&[ResolutionConfig::new("1h", 3)], &clock);
    let pod = [("namespace", "ns"), ("pod", "p"), ("uid", "u")];
    for (ts, bytes) in [
        (datetime!(2025-05-03 11:30 UTC), 100.0),
        (datetime!(2025-05-03 12:00 UTC), 160.0),
    ] {
        repository.update(&update_set(
            ts,
            vec![
                update("kube_pod_container_status_running", &pod, 1.0),
                update(
                    "container_network_receive_bytes_total",
                    &[("namespace", "ns"), ("pod", "p")],
                    bytes,
                ),
            ],
        ));
    }

    let previous = repository
        .get_collector("1h", datetime!(2025-05-03 11:00 UTC))
        .unwrap();
    assert_eq!(
        previous.query(MetricCollectorId::PodActiveMinutes).unwrap()[0].values,
        vec![
            MetricValue::at(1.0, datetime!(2025-05-03 11:30 UTC)),
            MetricValue::at(1.0, datetime!(2025-05-03 12:00 UTC)),
        ]
    );
    assert_eq!(
        previous.query(MetricCollectorId::NetReceiveBytes).unwrap()[0].values,
        vec![MetricValue::untimed(60.0)]
    );

    let current = repository
        .get_collector("1h", datetime!(2025-05-03 12:00 UTC))
        .unwrap();
    assert_eq!(
        current.query(MetricCollectorId::NetReceiveBytes).unwrap()[0].values,
        vec![MetricValue::untimed(0.0)]
    );
}

fn container_labels(container: &str) -> Labels {
    labels([
        ("namespace", "ns"),
        ("pod", "p"),
        ("container", container),
        ("node", "n1"),
        ("instance", "i"),
    ])
}

#[test]
fn test_filtered_series_never_reach_collectors() {
    let now = datetime!(2025-05-03 00:05 UTC);
    let clock = ManualClock::new(now);
    let repository = create_repository(&default_resolutions(), &clock);
    let updates = ["app", "POD", ""]
        .into_iter()
        .map(|name| {
            Update::new(
                "container_memory_working_set_bytes",
                container_labels(name),
                1024.0,
            )
        })
        .collect();
    repository.update(&update_set(now, updates));

    let bucket = repository.get_collector("10m", now).unwrap();
    let results = bucket.query(MetricCollectorId::RamUsageMax).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metric_labels["container"], "app");
}

#[test]
fn test_coverage_lists_buckets_per_resolution() {
    let clock = ManualClock::new(datetime!(2025-05-03 01:00 UTC));
    let repository = create_repository(&default_resolutions(), &clock);
    for minutes in [0, 10, 40] {
        repository.update(&update_set(
            datetime!(2025-05-03 00:05 UTC) + Duration::minutes(minutes),
            vec![update("kube_node_labels", &[("node", "n1")], 1.0)],
        ));
    }
    let coverage = repository.coverage();
    assert_eq!(
        coverage.keys().map(String::as_str).collect::<Vec<_>>(),
        ["10m", "1h", "1d"]
    );
    assert_eq!(
        coverage["10m"],
        [
            datetime!(2025-05-03 00:00 UTC),
            datetime!(2025-05-03 00:10 UTC),
            datetime!(2025-05-03 00:40 UTC),
        ]
    );
    assert_eq!(coverage["1h"], [datetime!(2025-05-03 00:00 UTC)]);
}

proptest! {
    #[test]
    fn test_buckets_respect_assignment_and_retention(
        offsets in proptest::collection::vec(0i64..(3 * 24 * 60 * 60), 1..40),
        retention in 1u32..6,
    ) {
        let base = datetime!(2025-05-01 00:00 UTC);
        let mut timestamps: Vec<OffsetDateTime> =
            offsets.iter().map(|s| base + Duration::seconds(*s)).collect();
        timestamps.sort();
        let now = *timestamps.last().unwrap();
        let clock = ManualClock::new(now);
        let configs = [
            ResolutionConfig::new("1h", retention),
            ResolutionConfig::new("1d", retention),
        ];
        let repository = create_repository(&configs, &clock);
        for ts in &timestamps {
            repository.update(&update_set(
                *ts,
                vec![update("kube_node_labels", &[("node", "n1")], 1.0)],
            ));
        }
        repository.evict();

        for store in repository.stores() {
            let resolution: Resolution = store.resolution();
            let limit = resolution.limit(now);
            for start in store.bucket_starts() {
                prop_assert!(start >= limit);
                prop_assert!(timestamps.iter().any(|ts| resolution.truncate(*ts) == start));
            }
        }
    }
}
