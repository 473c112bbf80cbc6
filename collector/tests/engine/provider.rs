use std::sync::Arc;

use rstest::rstest;
use tally_collector::{
    clock::ManualClock,
    error::QueryError,
    metric::catalog::MetricCollectorId,
    query::ErrorCollector,
    repository::provider::StoreProvider,
};
use tally_common::types::metric::MetricValue;
use time::{Duration, OffsetDateTime, macros::datetime};

use super::common::*;

const START: OffsetDateTime = datetime!(2025-05-03 00:00 UTC);

#[rstest]
#[case(Duration::minutes(2), "10m")]
#[case(Duration::hours(1), "1h")]
#[case(Duration::days(1) + Duration::minutes(10), "1d")]
fn test_window_picks_closest_resolution(#[case] window: Duration, #[case] expected: &str) {
    let clock = ManualClock::new(START);
    let provider = StoreProvider::new(create_repository(&default_resolutions(), &clock));
    let (resolution, bucket_start) = provider.select(START, START + window);
    assert_eq!(resolution.to_string(), expected);
    assert_eq!(bucket_start, START);
}

#[tokio::test]
async fn test_query_reads_the_selected_bucket() {
    let clock = ManualClock::new(START + Duration::minutes(5));
    let repository = create_repository(&default_resolutions(), &clock);
    repository.update(&update_set(
        START + Duration::minutes(5),
        vec![update(
            "kube_node_status_capacity_memory_bytes",
            &[("node", "n1")],
            8.0 * 1024.0 * 1024.0 * 1024.0,
        )],
    ));
    let provider = StoreProvider::new(Arc::clone(&repository));

    let results = provider
        .query(
            MetricCollectorId::NodeRamCapacity,
            START,
            START + Duration::minutes(10),
        )
        .await_result()
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].values,
        vec![MetricValue::untimed(8.0 * 1024.0 * 1024.0 * 1024.0)]
    );

    let query = results[0].clone().into_query_result(START);
    assert_eq!(query.values, vec![(START.unix_timestamp() as f64, 8.0 * 1024.0 * 1024.0 * 1024.0)]);
}

#[tokio::test]
async fn test_query_errors_collect_across_a_group() {
    let clock = ManualClock::new(START + Duration::days(2));
    let provider = StoreProvider::new(create_repository(&default_resolutions(), &clock));
    let errors = ErrorCollector::new();

    let empty = provider
        .query(
            MetricCollectorId::PodLabels,
            START + Duration::days(2),
            START + Duration::days(2) + Duration::minutes(10),
        )
        .with_error_collector(errors.clone())
        .await_result()
        .await;
    let expired = provider
        .query(MetricCollectorId::PodLabels, START - Duration::days(30), START - Duration::days(29))
        .with_error_collector(errors.clone())
        .await_result()
        .await;

    assert!(empty.is_empty() && expired.is_empty());
    let errors = errors.errors();
    assert!(matches!(errors[0], QueryError::BucketNotFound(_)));
    assert!(matches!(errors[1], QueryError::OutOfRetention(_)));
}
