//! `kubevirt_vmi_info` derivation

use super::{ClusterStores, CollectorResult, VMI_INFO};
use crate::models::{conditions, MigrationState, Pod, VendorObject, VirtualMachineInstance};

/// Placeholder for labels with no value
pub const NONE_PLACEHOLDER: &str = "<none>";
/// Placeholder for instance types and preferences from unknown vendors
pub const OTHER_PLACEHOLDER: &str = "<other>";

/// Label carrying the vendor of an instance type or preference
pub const INSTANCETYPE_VENDOR_LABEL: &str = "instancetype.kubevirt.io/vendor";

const WHITELISTED_VENDORS: &[&str] = &["kubevirt.io", "redhat.com"];

const ANNOTATION_PREFIX: &str = "vm.kubevirt.io/";
const INSTANCETYPE_ANNOTATION: &str = "kubevirt.io/instancetype-name";
const CLUSTER_INSTANCETYPE_ANNOTATION: &str = "kubevirt.io/cluster-instancetype-name";
const PREFERENCE_ANNOTATION: &str = "kubevirt.io/preference-name";
const CLUSTER_PREFERENCE_ANNOTATION: &str = "kubevirt.io/cluster-preference-name";

const CREATED_BY_LABEL: &str = "kubevirt.io/created-by";
const OUTDATED_LAUNCHER_IMAGE_LABEL: &str = "kubevirt.io/outdatedLauncherImage";

/// Migration state as it matters for picking the backing pod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome<'a> {
    /// No migration recorded
    None,
    /// Migration still running, the source pod still backs the VMI
    InProgress,
    /// Migration finished, the target pod backs the VMI
    Succeeded { target_pod: &'a str },
    /// Migration failed, the source pod keeps backing the VMI
    Failed {
        target_pod: &'a str,
        source_pod: Option<&'a str>,
    },
}

impl<'a> MigrationOutcome<'a> {
    pub fn from_state(state: Option<&'a MigrationState>) -> Self {
        match state {
            None => MigrationOutcome::None,
            Some(s) if s.failed => MigrationOutcome::Failed {
                target_pod: &s.target_pod,
                source_pod: Some(s.source_pod.as_str()).filter(|p| !p.is_empty()),
            },
            Some(s) if s.completed => MigrationOutcome::Succeeded {
                target_pod: &s.target_pod,
            },
            Some(_) => MigrationOutcome::InProgress,
        }
    }
}

/// Name of the virt-launcher pod currently backing the VMI
pub fn resolve_vmi_pod<'s>(vmi: &VirtualMachineInstance, stores: &'s ClusterStores) -> Option<&'s str> {
    if vmi.metadata.uid.is_empty() {
        return None;
    }

    let mut candidates = stores
        .pods_in_namespace(&vmi.metadata.namespace)
        .iter()
        .filter(|pod| pod.metadata.label(CREATED_BY_LABEL) == Some(vmi.metadata.uid.as_str()));

    let on_vmi_node = |pod: &&Pod| pod.spec.node_name == vmi.status.node_name;

    let pod = match MigrationOutcome::from_state(vmi.status.migration_state.as_ref()) {
        MigrationOutcome::None | MigrationOutcome::InProgress => candidates.find(on_vmi_node),
        MigrationOutcome::Succeeded { target_pod } => {
            candidates.find(|pod| pod.metadata.name == target_pod)
        }
        MigrationOutcome::Failed {
            source_pod: Some(source_pod),
            ..
        } => candidates.find(|pod| pod.metadata.name == source_pod),
        MigrationOutcome::Failed {
            target_pod,
            source_pod: None,
        } => candidates.find(|pod| pod.metadata.name != target_pod && on_vmi_node(pod)),
    };

    pod.map(|p| p.metadata.name.as_str())
}

/// os, workload and flavor from `vm.kubevirt.io/` annotations
fn system_info_from_annotations(vmi: &VirtualMachineInstance) -> (String, String, String) {
    let get = |key: &str| {
        vmi.metadata
            .annotation(&format!("{}{}", ANNOTATION_PREFIX, key))
            .unwrap_or(NONE_PLACEHOLDER)
            .to_string()
    };

    (get("os"), get("workload"), get("flavor"))
}

fn vendor_display_name(object: Option<&VendorObject>) -> String {
    match object {
        Some(o)
            if o.metadata
                .label(INSTANCETYPE_VENDOR_LABEL)
                .map(|v| WHITELISTED_VENDORS.contains(&v))
                .unwrap_or(false) =>
        {
            o.metadata.name.clone()
        }
        _ => OTHER_PLACEHOLDER.to_string(),
    }
}

fn instancetype_label(vmi: &VirtualMachineInstance, stores: &ClusterStores) -> String {
    if let Some(name) = vmi.metadata.annotation(INSTANCETYPE_ANNOTATION) {
        return vendor_display_name(stores.instancetype(&vmi.metadata.namespace, name));
    }
    if let Some(name) = vmi.metadata.annotation(CLUSTER_INSTANCETYPE_ANNOTATION) {
        return vendor_display_name(stores.cluster_instancetype(name));
    }
    String::new()
}

fn preference_label(vmi: &VirtualMachineInstance, stores: &ClusterStores) -> String {
    if let Some(name) = vmi.metadata.annotation(PREFERENCE_ANNOTATION) {
        return vendor_display_name(stores.preference(&vmi.metadata.namespace, name));
    }
    if let Some(name) = vmi.metadata.annotation(CLUSTER_PREFERENCE_ANNOTATION) {
        return vendor_display_name(stores.cluster_preference(name));
    }
    String::new()
}

fn bool_label(value: bool) -> String {
    value.to_string()
}

/// One `kubevirt_vmi_info` sample, value always 1
pub fn collect_vmi_info(vmi: &VirtualMachineInstance, stores: &ClusterStores) -> CollectorResult {
    let (os, workload, flavor) = system_info_from_annotations(vmi);
    let guest = &vmi.status.guest_os_info;
    let machine_type = vmi
        .status
        .machine
        .as_ref()
        .map(|m| m.machine_type.clone())
        .unwrap_or_default();

    let evictable = vmi.condition_status(conditions::LIVE_MIGRATABLE) == Some("True");
    let outdated = vmi
        .metadata
        .labels
        .contains_key(OUTDATED_LAUNCHER_IMAGE_LABEL);

    let vmi_pod = resolve_vmi_pod(vmi, stores).unwrap_or(NONE_PLACEHOLDER);

    let labels = vec![
        vmi.status.node_name.clone(),
        vmi.metadata.namespace.clone(),
        vmi.metadata.name.clone(),
        vmi.status.phase.to_lowercase(),
        os,
        workload,
        flavor,
        instancetype_label(vmi, stores),
        preference_label(vmi, stores),
        guest.kernel_release.clone(),
        machine_type,
        guest.machine.clone(),
        guest.name.clone(),
        guest.version_id.clone(),
        bool_label(evictable),
        bool_label(outdated),
        vmi_pod.to_string(),
    ];

    CollectorResult::new(&VMI_INFO, labels, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GuestOsInfo, Machine, VmiCondition};
    use crate::snapshot::ClusterSnapshot;
    use crate::stats::testutil::{pod_for_vmi, test_snapshot, test_stores};

    fn vmi_with_annotations(name: &str, annotations: &[(&str, &str)], phase: &str) -> VirtualMachineInstance {
        let mut vmi = VirtualMachineInstance::new("", name);
        for (k, v) in annotations {
            vmi.metadata.annotations.insert(k.to_string(), v.to_string());
        }
        vmi.status.phase = phase.to_string();
        vmi
    }

    fn migration_stores() -> ClusterStores {
        let mut snapshot: ClusterSnapshot = test_snapshot();
        snapshot.pods.push(pod_for_vmi(
            "virt-launcher-originalpod",
            "test-ns",
            "test-vmi-uid",
            "initial-node",
        ));
        snapshot.pods.push(pod_for_vmi(
            "virt-launcher-targetpod",
            "test-ns",
            "test-vmi-uid",
            "target-node",
        ));
        ClusterStores::from_snapshot(&snapshot)
    }

    fn migrating_vmi(node: &str, completed: bool, failed: bool) -> VirtualMachineInstance {
        let mut vmi = VirtualMachineInstance::new("test-ns", "test-vmi");
        vmi.metadata.uid = "test-vmi-uid".to_string();
        vmi.status.phase = "Running".to_string();
        vmi.status.node_name = node.to_string();
        vmi.status.migration_state = Some(MigrationState {
            target_pod: "virt-launcher-targetpod".to_string(),
            completed,
            failed,
            ..Default::default()
        });
        vmi
    }

    #[test]
    fn test_handles_different_phases() {
        let vmis = vec![
            vmi_with_annotations(
                "running#0",
                &[("vm.kubevirt.io/os", "centos8"), ("vm.kubevirt.io/workload", "server"), ("vm.kubevirt.io/flavor", "tiny")],
                "Running",
            ),
            vmi_with_annotations(
                "pending#0",
                &[("vm.kubevirt.io/os", "fedora33"), ("vm.kubevirt.io/workload", "workstation"), ("vm.kubevirt.io/flavor", "large")],
                "Pending",
            ),
            vmi_with_annotations(
                "scheduling#0",
                &[("vm.kubevirt.io/os", "centos7"), ("vm.kubevirt.io/dummy", "dummy")],
                "Scheduling",
            ),
        ];
        let stores = test_stores();

        let results: Vec<CollectorResult> =
            vmis.iter().map(|vmi| collect_vmi_info(vmi, &stores)).collect();

        assert_eq!(results.len(), 3);
        for r in &results {
            assert_eq!(r.family.name, "kubevirt_vmi_info");
            assert_eq!(r.value, 1.0);
            assert_eq!(r.labels.len(), 17);
            assert_eq!(r.labels[16], NONE_PLACEHOLDER);
        }

        assert_eq!(results[0].labels[3], "running");
        assert_eq!(&results[0].labels[4..7], &["centos8", "server", "tiny"]);
        assert_eq!(results[1].labels[3], "pending");
        assert_eq!(&results[1].labels[4..7], &["fedora33", "workstation", "large"]);
        assert_eq!(results[2].labels[3], "scheduling");
        assert_eq!(&results[2].labels[4..7], &["centos7", "<none>", "<none>"]);
    }

    #[test]
    fn test_guest_os_labels_come_from_guest_agent() {
        let mut vmi = vmi_with_annotations("pending#0", &[], "Pending");
        vmi.status.guest_os_info = GuestOsInfo {
            kernel_release: "6.5.6-300.fc39.x86_64".to_string(),
            machine: "x86_64".to_string(),
            name: "Fedora Linux".to_string(),
            version_id: "39".to_string(),
            ..Default::default()
        };
        vmi.status.machine = Some(Machine {
            machine_type: "q35".to_string(),
        });

        let result = collect_vmi_info(&vmi, &test_stores());

        assert_eq!(result.label("guest_os_kernel_release"), Some("6.5.6-300.fc39.x86_64"));
        assert_eq!(result.label("guest_os_machine"), Some("q35"));
        assert_eq!(result.label("guest_os_arch"), Some("x86_64"));
        assert_eq!(result.label("guest_os_name"), Some("Fedora Linux"));
        assert_eq!(result.label("guest_os_version_id"), Some("39"));
    }

    #[test]
    fn test_evictable_and_outdated_labels() {
        let mut vmi = vmi_with_annotations("vmi", &[], "Running");
        let stores = test_stores();

        let result = collect_vmi_info(&vmi, &stores);
        assert_eq!(result.label("evictable"), Some("false"));
        assert_eq!(result.label("outdated"), Some("false"));

        vmi.status.conditions.push(VmiCondition {
            condition_type: conditions::LIVE_MIGRATABLE.to_string(),
            status: "True".to_string(),
            reason: None,
        });
        vmi.metadata
            .labels
            .insert(OUTDATED_LAUNCHER_IMAGE_LABEL.to_string(), String::new());

        let result = collect_vmi_info(&vmi, &stores);
        assert_eq!(result.label("evictable"), Some("true"));
        assert_eq!(result.label("outdated"), Some("true"));
    }

    #[test]
    fn test_vmi_pod_after_successful_migration() {
        let stores = migration_stores();
        let vmi = migrating_vmi("target-node", true, false);

        let result = collect_vmi_info(&vmi, &stores);

        assert_eq!(result.labels.len(), 17);
        assert_eq!(result.labels[16], "virt-launcher-targetpod");
    }

    #[test]
    fn test_vmi_pod_after_failed_migration() {
        let stores = migration_stores();
        let vmi = migrating_vmi("initial-node", true, true);

        let result = collect_vmi_info(&vmi, &stores);

        assert_eq!(result.labels[16], "virt-launcher-originalpod");
    }

    #[test]
    fn test_vmi_pod_failed_migration_prefers_named_source_pod() {
        let stores = migration_stores();
        let mut vmi = migrating_vmi("target-node", false, true);
        vmi.status.migration_state.as_mut().unwrap().source_pod =
            "virt-launcher-originalpod".to_string();

        assert_eq!(resolve_vmi_pod(&vmi, &stores), Some("virt-launcher-originalpod"));
    }

    #[test]
    fn test_vmi_pod_during_migration_follows_node() {
        let stores = migration_stores();
        let vmi = migrating_vmi("initial-node", false, false);

        assert_eq!(resolve_vmi_pod(&vmi, &stores), Some("virt-launcher-originalpod"));
    }

    #[test]
    fn test_vmi_pod_requires_created_by_label() {
        let stores = migration_stores();
        let mut vmi = migrating_vmi("initial-node", false, false);
        vmi.metadata.uid = "another-uid".to_string();

        assert_eq!(resolve_vmi_pod(&vmi, &stores), None);
    }

    #[test]
    fn test_migration_outcome_decision_table() {
        let mut state = MigrationState {
            target_pod: "target".to_string(),
            ..Default::default()
        };
        assert_eq!(MigrationOutcome::from_state(None), MigrationOutcome::None);
        assert_eq!(MigrationOutcome::from_state(Some(&state)), MigrationOutcome::InProgress);

        state.completed = true;
        assert_eq!(
            MigrationOutcome::from_state(Some(&state)),
            MigrationOutcome::Succeeded { target_pod: "target" }
        );

        state.failed = true;
        assert_eq!(
            MigrationOutcome::from_state(Some(&state)),
            MigrationOutcome::Failed {
                target_pod: "target",
                source_pod: None
            }
        );
    }

    fn assert_vendor_label(annotation: &str, value: &str, index: usize, expected: &str) {
        let mut vmi = VirtualMachineInstance::new("test-ns", "running");
        if !value.is_empty() {
            vmi.metadata
                .annotations
                .insert(annotation.to_string(), value.to_string());
        }

        let result = collect_vmi_info(&vmi, &test_stores());

        assert_eq!(result.labels.len(), 17);
        assert_eq!(result.labels[index], expected, "{}={}", annotation, value);
    }

    #[test]
    fn test_instance_type_label() {
        let cases = [
            (INSTANCETYPE_ANNOTATION, "", ""),
            (INSTANCETYPE_ANNOTATION, "i-managed", "i-managed"),
            (INSTANCETYPE_ANNOTATION, "i-unmanaged", "<other>"),
            (INSTANCETYPE_ANNOTATION, "i-missing", "<other>"),
            (CLUSTER_INSTANCETYPE_ANNOTATION, "", ""),
            (CLUSTER_INSTANCETYPE_ANNOTATION, "ci-managed", "ci-managed"),
            (CLUSTER_INSTANCETYPE_ANNOTATION, "ci-unmanaged", "<other>"),
        ];
        for (annotation, value, expected) in cases {
            assert_vendor_label(annotation, value, 7, expected);
        }
    }

    #[test]
    fn test_preference_label() {
        let cases = [
            (PREFERENCE_ANNOTATION, "", ""),
            (PREFERENCE_ANNOTATION, "p-managed", "p-managed"),
            (PREFERENCE_ANNOTATION, "p-unmanaged", "<other>"),
            (CLUSTER_PREFERENCE_ANNOTATION, "", ""),
            (CLUSTER_PREFERENCE_ANNOTATION, "cp-managed", "cp-managed"),
            (CLUSTER_PREFERENCE_ANNOTATION, "cp-unmanaged", "<other>"),
        ];
        for (annotation, value, expected) in cases {
            assert_vendor_label(annotation, value, 8, expected);
        }
    }
}
