use std::{future::Future, sync::Arc};

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    kind: RunStatus,
    /// Number of successful `stop` transitions so far.
    stops: u64,
}

/// Lifecycle of a background loop: `idle -> running -> stopping -> idle`.
///
/// Every transition is a compare-and-set. Waiters subscribe to the shared
/// channel, so a waiter that subscribes while idle is still woken by the
/// next stop, even if the loop has already reset by the time it is polled.
#[derive(Debug, Clone)]
pub struct RunState {
    tx: Arc<watch::Sender<Status>>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Status {
            kind: RunStatus::Idle,
            stops: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn status(&self) -> RunStatus {
        self.tx.borrow().kind
    }

    fn transition(&self, from: RunStatus, to: RunStatus) -> bool {
        self.tx.send_if_modified(|status| {
            if status.kind != from {
                return false;
            }
            status.kind = to;
            if to == RunStatus::Stopping {
                status.stops += 1;
            }
            true
        })
    }

    /// `idle -> running`. False if not idle.
    pub fn start(&self) -> bool {
        self.transition(RunStatus::Idle, RunStatus::Running)
    }

    /// `running -> stopping`. False if not running.
    pub fn stop(&self) -> bool {
        self.transition(RunStatus::Running, RunStatus::Stopping)
    }

    /// `stopping -> idle`. False if not stopping.
    pub fn reset(&self) -> bool {
        self.transition(RunStatus::Stopping, RunStatus::Idle)
    }

    /// Resolves once the state is `stopping`, or once a stop has happened
    /// after this call. The subscription is taken eagerly, before the
    /// returned future is first polled.
    pub fn on_stop(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let seen = rx.borrow_and_update().stops;
        async move {
            let _ = rx
                .wait_for(|s| s.kind == RunStatus::Stopping || s.stops > seen)
                .await;
        }
    }

    /// Resolves once the state is `idle`.
    pub async fn wait_for_reset(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|s| s.kind == RunStatus::Idle).await;
    }
}
