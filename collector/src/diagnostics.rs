//! Per-source health, fed by scrape events.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{EventBus, ScrapeEvent};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum DiagnosticId {
    #[strum(serialize = "DCGM")]
    #[serde(rename = "DCGM")]
    Dcgm,
    OpenCost,
    NodeStats,
    NetworkCosts,
    KubernetesNodes,
    KubernetesNamespaces,
    KubernetesPods,
    KubernetesServices,
    KubernetesDeployments,
    KubernetesStatefulSets,
    KubernetesReplicaSets,
    KubernetesPersistentVolumes,
    KubernetesPersistentVolumeClaims,
}

const DOCS: &str = "https://www.opencost.io/docs/";

impl DiagnosticId {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dcgm => "DCGM exporter GPU metrics are available",
            Self::OpenCost => "Cost exporter metrics are available",
            Self::NodeStats => "Node stat summaries are available",
            Self::NetworkCosts => "Network cost metrics are available",
            Self::KubernetesNodes => "Kubernetes nodes are scraped",
            Self::KubernetesNamespaces => "Kubernetes namespaces are scraped",
            Self::KubernetesPods => "Kubernetes pods are scraped",
            Self::KubernetesServices => "Kubernetes services are scraped",
            Self::KubernetesDeployments => "Kubernetes deployments are scraped",
            Self::KubernetesStatefulSets => "Kubernetes stateful sets are scraped",
            Self::KubernetesReplicaSets => "Kubernetes replica sets are scraped",
            Self::KubernetesPersistentVolumes => "Kubernetes persistent volumes are scraped",
            Self::KubernetesPersistentVolumeClaims => {
                "Kubernetes persistent volume claims are scraped"
            }
        }
    }

    pub fn doc_link(self) -> String {
        let page = match self {
            Self::Dcgm => "integrations/gpu",
            Self::NetworkCosts => "configuration/network-costs",
            Self::OpenCost | Self::NodeStats => "installation/install",
            _ => "installation/troubleshooting",
        };
        format!("{DOCS}{page}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticStats {
    pub total: usize,
    pub success: usize,
    pub fail: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticDetails {
    pub stats: DiagnosticStats,
    pub label: &'static str,
    pub doc_link: String,
    pub errors: Vec<String>,
    pub passed: bool,
}

impl DiagnosticDetails {
    fn pending(id: DiagnosticId) -> Self {
        Self {
            stats: DiagnosticStats::default(),
            label: id.label(),
            doc_link: id.doc_link(),
            errors: Vec::new(),
            passed: false,
        }
    }
}

#[derive(Debug)]
pub struct DiagnosticsRegistry {
    details: Mutex<IndexMap<DiagnosticId, DiagnosticDetails>>,
}

impl Default for DiagnosticsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsRegistry {
    /// A registry with every known diagnostic in its not-yet-run state.
    pub fn new() -> Self {
        use strum::IntoEnumIterator;
        Self {
            details: Mutex::new(
                DiagnosticId::iter()
                    .map(|id| (id, DiagnosticDetails::pending(id)))
                    .collect(),
            ),
        }
    }

    /// Overwrite the diagnostic the event belongs to. Events without a
    /// diagnostic are ignored.
    pub fn record(&self, event: &ScrapeEvent) {
        let Some(id) = event.diagnostic else {
            return;
        };
        let details = DiagnosticDetails {
            stats: DiagnosticStats {
                total: event.total,
                success: event.success,
                fail: event.fail,
            },
            label: id.label(),
            doc_link: id.doc_link(),
            errors: event.errors.clone(),
            passed: event.fail == 0 && event.errors.is_empty(),
        };
        self.details.lock().insert(id, details);
    }

    pub fn details(&self, id: DiagnosticId) -> Option<DiagnosticDetails> {
        self.details.lock().get(&id).cloned()
    }

    pub fn all_details(&self) -> Vec<(DiagnosticId, DiagnosticDetails)> {
        self.details
            .lock()
            .iter()
            .map(|(id, details)| (*id, details.clone()))
            .collect()
    }

    /// Follow `bus` until cancelled or the bus closes.
    pub fn spawn_listener(
        self: &Arc<Self>,
        bus: &EventBus,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = rx.recv() => match res {
                        Ok(event) => registry.record(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "diagnostics listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("diagnostics listener stopped");
        })
    }
}
