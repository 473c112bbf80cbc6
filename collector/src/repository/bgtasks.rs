use std::{convert::Infallible, error::Error, future::Future, sync::Arc};

use tally_common::types::interval::Interval;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Repository, wal::Wal};
use crate::clock::{self, SharedClock};

/// Spawn bucket eviction for every resolution, each firing on its own
/// interval boundaries, plus WAL cleaning on the shortest interval.
pub fn spawn(
    repository: &Arc<Repository>,
    wal: Option<Arc<Wal>>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for store in repository.stores() {
        let store = Arc::clone(store);
        handles.push(spawn_bgtask(
            "bucket-eviction",
            store.resolution().interval(),
            Arc::clone(repository.clock()),
            cancel.child_token(),
            move || {
                let store = Arc::clone(&store);
                async move {
                    store.evict();
                    Ok::<_, Infallible>(())
                }
            },
        ));
    }
    if let Some(wal) = wal {
        let interval = repository
            .resolutions()
            .map(|r| r.interval())
            .min_by_key(|i| i.duration())
            .expect("invariant violation: repository without resolutions");
        handles.push(spawn_bgtask(
            "wal-clean",
            interval,
            Arc::clone(repository.clock()),
            cancel.child_token(),
            move || {
                let wal = Arc::clone(&wal);
                async move { wal.clean().await.map(drop) }
            },
        ));
    }
    handles
}

fn spawn_bgtask<Tick, Fut, E>(
    name: &'static str,
    interval: Interval,
    clock: SharedClock,
    cancel: CancellationToken,
    tick: Tick,
) -> JoinHandle<()>
where
    Tick: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Error + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = clock.now();
            let next = interval.add(interval.truncate(now), 1);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(task = name, %interval, "bgtask cancelled");
                    break;
                }
                _ = tokio::time::sleep(clock::until(now, next)) => {
                    run_tick(name, &tick).await;
                }
            }
        }
    })
}

async fn run_tick<Tick, Fut, E>(task: &'static str, tick: &Tick)
where
    Tick: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Error + Send + Sync,
{
    if let Err(error) = tick().await {
        warn!(task, %error, "bgtask tick failed");
    }
}
