use std::{sync::LazyLock, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use prometheus::{
    Encoder, Histogram, IntCounter, IntGaugeVec, TextEncoder, register_histogram,
    register_int_counter, register_int_gauge_vec,
};

pub fn observe_scrape(duration: Duration, updates: usize) {
    static DURATION: LazyLock<Histogram> = LazyLock::new(|| {
        register_histogram!(
            "tally_scrape_duration_seconds",
            "Duration of one scrape tick across all scrapers in seconds",
            vec![0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000]
        )
        .unwrap()
    });
    static UPDATES: LazyLock<Histogram> = LazyLock::new(|| {
        register_histogram!(
            "tally_scrape_updates",
            "Number of updates produced by one scrape tick",
            vec![0.0, 10.0, 100.0, 1000.0, 10_000.0, 50_000.0, 100_000.0]
        )
        .unwrap()
    });
    DURATION.observe(duration.as_secs_f64());
    UPDATES.observe(updates as f64);
}

pub fn record_stale_update() {
    static STALE: LazyLock<IntCounter> = LazyLock::new(|| {
        register_int_counter!(
            "tally_stale_updates_total",
            "Update sets dropped for preceding a resolution's retention limit"
        )
        .unwrap()
    });
    STALE.inc();
}

pub fn record_wal_write_failure() {
    static FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
        register_int_counter!(
            "tally_wal_write_failures_total",
            "Update sets that could not be written to the WAL"
        )
        .unwrap()
    });
    FAILURES.inc();
}

static LIVE_BUCKETS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "tally_live_buckets",
        "Buckets held in memory per resolution",
        &["resolution"]
    )
    .unwrap()
});

pub fn record_eviction(resolution: &str, evicted: usize, live: usize) {
    static EVICTED: LazyLock<IntCounter> = LazyLock::new(|| {
        register_int_counter!(
            "tally_buckets_evicted_total",
            "Buckets evicted for falling out of retention"
        )
        .unwrap()
    });
    EVICTED.inc_by(evicted as u64);
    set_live_buckets(resolution, live);
}

pub fn set_live_buckets(resolution: &str, live: usize) {
    LIVE_BUCKETS
        .with_label_values(&[resolution])
        .set(live as i64);
}

/// Text exposition of every registered metric, for an embedder's `/metrics`
/// endpoint. The engine serves no HTTP itself.
pub fn gather() -> Bytes {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = BytesMut::new().writer();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    buffer.into_inner().freeze()
}
