//! The process-wide definition of what gets aggregated.
//!
//! Every bucket is built from [`CATALOG`], so buckets of every resolution
//! share one shape and WAL replay lands in the same structure it left.

use std::sync::Arc;

use tally_common::types::labels::{Labels, label_value};

use super::{MetricCollector, store::{MetricStore, MetricStoreFactory}};
use crate::aggregator::AggregatorKind;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum MetricCollectorId {
    PodActiveMinutes,
    NodeActiveMinutes,
    PvActiveMinutes,
    PvcInfo,
    PvInfo,
    PvCapacity,
    PvCost,
    PvcAllocation,
    PvcRequests,
    CpuAllocation,
    CpuRequests,
    CpuLimits,
    CpuUsageAverage,
    CpuUsageMax,
    RamAllocation,
    RamRequests,
    RamLimits,
    RamUsageAverage,
    RamUsageMax,
    GpuAllocation,
    GpuRequests,
    GpuUsageAverage,
    GpuUsageMax,
    NodeCpuCapacity,
    NodeRamCapacity,
    NodeCpuHourlyCost,
    NodeRamHourlyCost,
    NodeGpuHourlyCost,
    NodeGpuCount,
    NodeTotalHourlyCost,
    NodeIsSpot,
    LbActiveMinutes,
    LbCost,
    ClusterManagementCost,
    NetZoneEgress,
    NetRegionEgress,
    NetInternetEgress,
    NetReceiveBytes,
    NetTransmitBytes,
    NetPeakReceiveRate,
    NetPeakTransmitRate,
    NamespaceLabels,
    NamespaceAnnotations,
    PodLabels,
    PodAnnotations,
    NodeLabels,
    ServiceLabels,
    DeploymentLabels,
    StatefulSetLabels,
    PodOwners,
    ReplicaSetOwners,
    ReplicaSetsWithoutOwners,
}

/// Predicate over an observation's labels.
pub type LabelFilter = fn(&Labels) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct CollectorDefinition {
    pub id: MetricCollectorId,
    pub metric_name: &'static str,
    pub identity_labels: &'static [&'static str],
    pub kind: AggregatorKind,
    pub filter: Option<LabelFilter>,
}

impl CollectorDefinition {
    pub fn build(&self) -> MetricCollector {
        MetricCollector::new(
            self.id,
            self.metric_name,
            self.identity_labels.iter().copied(),
            self.kind,
            self.filter,
        )
    }
}

const fn def(
    id: MetricCollectorId,
    metric_name: &'static str,
    identity_labels: &'static [&'static str],
    kind: AggregatorKind,
    filter: Option<LabelFilter>,
) -> CollectorDefinition {
    CollectorDefinition {
        id,
        metric_name,
        identity_labels,
        kind,
        filter,
    }
}

fn is_container(labels: &Labels) -> bool {
    let container = label_value(labels, "container");
    !container.is_empty() && container != "POD"
}

fn is_cpu_core(labels: &Labels) -> bool {
    is_container(labels)
        && label_value(labels, "resource") == "cpu"
        && label_value(labels, "unit") == "core"
}

fn is_memory_byte(labels: &Labels) -> bool {
    is_container(labels)
        && label_value(labels, "resource") == "memory"
        && label_value(labels, "unit") == "byte"
}

fn is_gpu(labels: &Labels) -> bool {
    is_container(labels) && label_value(labels, "resource") == "nvidia_com_gpu"
}

fn is_scheduled(labels: &Labels) -> bool {
    !label_value(labels, "node").is_empty()
}

fn is_zone_egress(labels: &Labels) -> bool {
    label_value(labels, "internet") == "false"
        && label_value(labels, "same_zone") == "false"
        && label_value(labels, "same_region") == "true"
}

fn is_region_egress(labels: &Labels) -> bool {
    label_value(labels, "internet") == "false"
        && label_value(labels, "same_zone") == "false"
        && label_value(labels, "same_region") == "false"
}

fn is_internet_egress(labels: &Labels) -> bool {
    label_value(labels, "internet") == "true"
}

fn is_owned_by_replica_set(labels: &Labels) -> bool {
    label_value(labels, "owner_kind") == "ReplicaSet"
}

fn is_unowned(labels: &Labels) -> bool {
    label_value(labels, "owner_kind") == "<none>"
}

const CONTAINER: &[&str] = &["namespace", "pod", "container", "node", "instance"];
const POD: &[&str] = &["namespace", "pod", "uid"];
const NODE: &[&str] = &["node", "instance_type", "provider_id"];

#[rustfmt::skip]
pub const CATALOG: &[CollectorDefinition] = {
    use AggregatorKind::*;
    use MetricCollectorId as Id;
    &[
        // lifetimes
        def(Id::PodActiveMinutes, "kube_pod_container_status_running", POD, ActiveMinutes, None),
        def(Id::NodeActiveMinutes, "kube_node_status_capacity_cpu_cores", &["node", "provider_id"], ActiveMinutes, None),
        def(Id::PvActiveMinutes, "kube_persistentvolume_capacity_bytes", &["persistentvolume"], ActiveMinutes, None),
        def(Id::LbActiveMinutes, "kubecost_load_balancer_cost", &["namespace", "service_name", "ingress_ip"], ActiveMinutes, None),
        // volumes
        def(Id::PvcInfo, "kube_persistentvolumeclaim_info", &["namespace", "persistentvolumeclaim", "volumename", "storageclass"], Info, None),
        def(Id::PvInfo, "kubecost_pv_info", &["persistentvolume", "storageclass", "provider_id"], Info, None),
        def(Id::PvCapacity, "kube_persistentvolume_capacity_bytes", &["persistentvolume"], AverageOverTime, None),
        def(Id::PvCost, "pv_hourly_cost", &["persistentvolume", "volumename", "provider_id"], AverageOverTime, None),
        def(Id::PvcAllocation, "pod_pvc_allocation", &["namespace", "pod", "persistentvolumeclaim", "persistentvolume"], AverageOverTime, None),
        def(Id::PvcRequests, "kube_persistentvolumeclaim_resource_requests_storage_bytes", &["namespace", "persistentvolumeclaim"], AverageOverTime, None),
        // cpu
        def(Id::CpuAllocation, "container_cpu_allocation", CONTAINER, AverageOverTime, Some(is_container)),
        def(Id::CpuRequests, "kube_pod_container_resource_requests", CONTAINER, AverageOverTime, Some(is_cpu_core)),
        def(Id::CpuLimits, "kube_pod_container_resource_limits", CONTAINER, AverageOverTime, Some(is_cpu_core)),
        def(Id::CpuUsageAverage, "container_cpu_usage_seconds_total", CONTAINER, Rate, Some(is_container)),
        def(Id::CpuUsageMax, "container_cpu_usage_seconds_total", CONTAINER, IRateMax, Some(is_container)),
        // memory
        def(Id::RamAllocation, "container_memory_allocation_bytes", CONTAINER, AverageOverTime, Some(is_container)),
        def(Id::RamRequests, "kube_pod_container_resource_requests", CONTAINER, AverageOverTime, Some(is_memory_byte)),
        def(Id::RamLimits, "kube_pod_container_resource_limits", &["namespace", "pod", "container", "node"], AverageOverTime, Some(is_memory_byte)),
        def(Id::RamUsageAverage, "container_memory_working_set_bytes", CONTAINER, AverageOverTime, Some(is_container)),
        def(Id::RamUsageMax, "container_memory_working_set_bytes", CONTAINER, MaxOverTime, Some(is_container)),
        // gpu
        def(Id::GpuAllocation, "container_gpu_allocation", CONTAINER, AverageOverTime, Some(is_container)),
        def(Id::GpuRequests, "kube_pod_container_resource_requests", CONTAINER, AverageOverTime, Some(is_gpu)),
        def(Id::GpuUsageAverage, "DCGM_FI_PROF_GR_ENGINE_ACTIVE", &["namespace", "pod", "container"], AverageOverTime, Some(is_container)),
        def(Id::GpuUsageMax, "DCGM_FI_PROF_GR_ENGINE_ACTIVE", &["namespace", "pod", "container"], MaxOverTime, Some(is_container)),
        // nodes
        def(Id::NodeCpuCapacity, "kube_node_status_capacity_cpu_cores", &["node"], AverageOverTime, None),
        def(Id::NodeRamCapacity, "kube_node_status_capacity_memory_bytes", &["node"], AverageOverTime, None),
        def(Id::NodeCpuHourlyCost, "node_cpu_hourly_cost", NODE, AverageOverTime, None),
        def(Id::NodeRamHourlyCost, "node_ram_hourly_cost", NODE, AverageOverTime, None),
        def(Id::NodeGpuHourlyCost, "node_gpu_hourly_cost", NODE, AverageOverTime, None),
        def(Id::NodeGpuCount, "node_gpu_count", NODE, AverageOverTime, None),
        def(Id::NodeTotalHourlyCost, "node_total_hourly_cost", NODE, AverageOverTime, None),
        def(Id::NodeIsSpot, "kubecost_node_is_spot", NODE, AverageOverTime, None),
        // cluster
        def(Id::LbCost, "kubecost_load_balancer_cost", &["namespace", "service_name", "ingress_ip"], AverageOverTime, None),
        def(Id::ClusterManagementCost, "kubecost_cluster_management_cost", &["provisioner_name"], AverageOverTime, None),
        // network
        def(Id::NetZoneEgress, "kubecost_pod_network_egress_bytes_total", &["namespace", "pod_name"], Increase, Some(is_zone_egress)),
        def(Id::NetRegionEgress, "kubecost_pod_network_egress_bytes_total", &["namespace", "pod_name"], Increase, Some(is_region_egress)),
        def(Id::NetInternetEgress, "kubecost_pod_network_egress_bytes_total", &["namespace", "pod_name"], Increase, Some(is_internet_egress)),
        def(Id::NetReceiveBytes, "container_network_receive_bytes_total", &["namespace", "pod"], Increase, None),
        def(Id::NetTransmitBytes, "container_network_transmit_bytes_total", &["namespace", "pod"], Increase, None),
        def(Id::NetPeakReceiveRate, "container_network_receive_bytes_total", &["namespace", "pod"], IRateMax, None),
        def(Id::NetPeakTransmitRate, "container_network_transmit_bytes_total", &["namespace", "pod"], IRateMax, None),
        // metadata
        def(Id::NamespaceLabels, "kube_namespace_labels", &["namespace"], Info, None),
        def(Id::NamespaceAnnotations, "kube_namespace_annotations", &["namespace"], Info, None),
        def(Id::PodLabels, "kube_pod_labels", POD, Info, None),
        def(Id::PodAnnotations, "kube_pod_annotations", POD, Info, None),
        def(Id::NodeLabels, "kube_node_labels", &["node"], Info, None),
        def(Id::ServiceLabels, "service_selector_labels", &["namespace", "service"], Info, None),
        def(Id::DeploymentLabels, "deployment_match_labels", &["namespace", "deployment"], Info, None),
        def(Id::StatefulSetLabels, "statefulSet_match_labels", &["namespace", "statefulSet"], Info, None),
        def(Id::PodOwners, "kube_pod_owner", &["namespace", "pod", "owner_name", "owner_kind"], Info, Some(is_scheduled)),
        def(Id::ReplicaSetOwners, "kube_replicaset_owner", &["namespace", "replicaset", "owner_name", "owner_kind"], Info, Some(is_owned_by_replica_set)),
        def(Id::ReplicaSetsWithoutOwners, "kube_replicaset_owner", &["namespace", "replicaset"], Info, Some(is_unowned)),
    ]
};

/// Definition registered under `id`.
pub fn definition(id: MetricCollectorId) -> Option<&'static CollectorDefinition> {
    CATALOG.iter().find(|def| def.id == id)
}

/// A fresh bucket with every catalogued collector registered.
pub fn new_metric_store() -> MetricStore {
    let mut store = MetricStore::new();
    for def in CATALOG {
        store
            .register(def.build())
            .expect("invariant violation: duplicate id in collector catalogue");
    }
    store
}

pub fn store_factory() -> MetricStoreFactory {
    Arc::new(new_metric_store)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;
    use tally_common::types::labels::labels;

    use super::*;

    #[test]
    fn every_id_is_defined_exactly_once() {
        let defined: HashSet<_> = CATALOG.iter().map(|def| def.id).collect();
        assert_eq!(defined.len(), CATALOG.len());
        for id in MetricCollectorId::iter() {
            assert!(defined.contains(&id), "{id} has no definition");
        }
    }

    #[test]
    fn factory_registers_whole_catalogue() {
        let store = store_factory()();
        assert_eq!(store.len(), CATALOG.len());
    }

    #[test]
    fn ram_limits_keeps_shorter_identity() {
        let requests = definition(MetricCollectorId::RamRequests).unwrap();
        let limits = definition(MetricCollectorId::RamLimits).unwrap();
        assert_eq!(
            limits.identity_labels.len() + 1,
            requests.identity_labels.len()
        );
    }

    #[test]
    fn container_filter_rejects_pause_and_empty() {
        assert!(is_container(&labels([("container", "app")])));
        assert!(!is_container(&labels([("container", "POD")])));
        assert!(!is_container(&labels([("container", "")])));
        assert!(!is_container(&Labels::new()));
    }

    #[test]
    fn resource_filters_match_exact_strings() {
        let cpu = labels([("container", "app"), ("resource", "cpu"), ("unit", "core")]);
        let mem = labels([("container", "app"), ("resource", "memory"), ("unit", "byte")]);
        let cpu_millis = labels([("container", "app"), ("resource", "cpu"), ("unit", "millicore")]);
        assert!(is_cpu_core(&cpu));
        assert!(!is_cpu_core(&mem));
        assert!(!is_cpu_core(&cpu_millis));
        assert!(is_memory_byte(&mem));
        assert!(!is_memory_byte(&cpu));
    }

    #[test]
    fn egress_classes_are_disjoint() {
        let zone = labels([
            ("internet", "false"),
            ("same_zone", "false"),
            ("same_region", "true"),
        ]);
        let region = labels([
            ("internet", "false"),
            ("same_zone", "false"),
            ("same_region", "false"),
        ]);
        let internet = labels([("internet", "true")]);
        for (labels, expected) in [
            (zone, [true, false, false]),
            (region, [false, true, false]),
            (internet, [false, false, true]),
        ] {
            assert_eq!(
                [
                    is_zone_egress(&labels),
                    is_region_egress(&labels),
                    is_internet_egress(&labels)
                ],
                expected
            );
        }
    }
}
