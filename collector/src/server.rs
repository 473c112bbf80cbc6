use std::{path::PathBuf, sync::Arc, time::Duration};

use tally_common::types::{interval::Interval, resolution::ResolutionConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    clock::{SharedClock, SystemClock},
    diagnostics::DiagnosticsRegistry,
    events::EventBus,
    metric::catalog,
    repository::{Repository, bgtasks, wal::Wal},
    scrape::{Scraper, scheduler::ScrapeController},
};

#[derive(clap::Args, Debug, Clone)]
pub struct CollectorArgs {
    /// Identifier of the cluster; namespaces the WAL directory.
    #[arg(long, env = "CLUSTER_ID", default_value = "cluster-one")]
    pub cluster_id: String,

    /// Port network-cost sidecar pods expose metrics on. Read by the embedder
    /// that builds the network-cost scraper; the engine itself never dials it.
    #[arg(long, env = "NETWORK_PORT", default_value_t = 3001)]
    pub network_port: u16,

    /// Number of 10-minute buckets kept. Zero disables the resolution.
    #[arg(
        long = "collector-10m-resolution-retention",
        env = "COLLECTOR_10M_RESOLUTION_RETENTION",
        default_value_t = 36
    )]
    pub retention_10m: u32,

    /// Number of 1-hour buckets kept. Zero disables the resolution.
    #[arg(
        long = "collector-1h-resolution-retention",
        env = "COLLECTOR_1H_RESOLUTION_RETENTION",
        default_value_t = 49
    )]
    pub retention_1h: u32,

    /// Number of 1-day buckets kept. Zero disables the resolution.
    #[arg(
        long = "collector-1d-resolution-retention",
        env = "COLLECTOR_1D_RESOLUTION_RETENTION",
        default_value_t = 15
    )]
    pub retention_1d: u32,

    /// Time between scrapes, e.g. `30s` or `1m`.
    #[arg(
        long = "collector-scrape-interval",
        env = "COLLECTOR_SCRAPE_INTERVAL",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub scrape_interval: Duration,

    /// Root directory of the write-ahead log.
    #[arg(long, value_name = "DIR", env = "COLLECTOR_WAL_ROOT", default_value = "/var/configs/db")]
    pub wal_root: PathBuf,
}

impl CollectorArgs {
    pub fn resolutions(&self) -> Vec<ResolutionConfig> {
        [
            ("10m", self.retention_10m),
            ("1h", self.retention_1h),
            ("1d", self.retention_1d),
        ]
        .into_iter()
        .filter(|(interval, retention)| {
            if *retention == 0 {
                info!(interval, "resolution disabled");
            }
            *retention > 0
        })
        .map(|(interval, retention)| ResolutionConfig::new(interval, retention))
        .collect()
    }

    pub fn scrape_interval(&self) -> eyre::Result<Interval> {
        if self.scrape_interval.subsec_nanos() != 0 {
            eyre::bail!(
                "scrape interval {} must be a whole number of seconds",
                humantime::format_duration(self.scrape_interval)
            );
        }
        Ok(Interval::from_secs(self.scrape_interval.as_secs())?)
    }
}

pub async fn run(args: CollectorArgs) -> eyre::Result<()> {
    warn!("no scrapers are registered; buckets fill only from the WAL");
    run_with_scrapers(args, Vec::new()).await
}

pub async fn run_with_scrapers(
    args: CollectorArgs,
    scrapers: Vec<Arc<dyn Scraper>>,
) -> eyre::Result<()> {
    info!(?args);

    let clock: SharedClock = Arc::new(SystemClock);
    let interval = args.scrape_interval()?;
    let repository = Arc::new(Repository::new(
        &args.resolutions(),
        catalog::store_factory(),
        Arc::clone(&clock),
    )?);
    let wal = open_wal(&args, Arc::clone(&repository)).await;

    let cancel = CancellationToken::new();
    let bus = EventBus::new();
    let diagnostics = Arc::new(DiagnosticsRegistry::new());
    let mut tasks = bgtasks::spawn(&repository, Some(Arc::clone(&wal)), &cancel);
    tasks.push(diagnostics.spawn_listener(&bus, cancel.child_token()));

    let controller = ScrapeController::new(interval, scrapers, wal, bus, clock);
    controller.start();
    info!(%interval, "collector running");

    shutdown_signal().await;

    controller.stop();
    controller.wait_for_reset().await;
    cancel.cancel();
    for task in tasks {
        task.await?;
    }
    info!(coverage = ?repository.coverage(), "collector stopped");
    Ok(())
}

/// Open the WAL and replay it into `repository`. The repository stays
/// authoritative: an unreadable WAL only costs history.
async fn open_wal(args: &CollectorArgs, repository: Arc<Repository>) -> Arc<Wal> {
    let wal = Arc::new(Wal::new(&args.wal_root, &args.cluster_id, repository));
    if let Err(error) = wal.restore().await {
        warn!(%error, "WAL restore failed; starting empty");
    }
    wal
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("ctrl-c");
    };

    #[cfg(unix)]
    let term = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = term => {
            info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
