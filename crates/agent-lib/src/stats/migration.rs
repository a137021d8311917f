//! Migration start/end time derivation

use super::{ClusterStores, CollectorResult, VMI_MIGRATION_END_TIME, VMI_MIGRATION_START_TIME};
use crate::models::VirtualMachineInstance;

/// Start sample whenever a start timestamp exists; end sample once the
/// migration completed with both timestamps set.
pub fn collect_vmi_migration_time(
    vmi: &VirtualMachineInstance,
    stores: &ClusterStores,
) -> Vec<CollectorResult> {
    let Some(state) = vmi.status.migration_state.as_ref() else {
        return Vec::new();
    };
    let Some(start) = state.start_timestamp else {
        return Vec::new();
    };

    let migration_name = stores
        .migration_by_uid(&state.migration_uid)
        .map(|m| m.metadata.name.clone())
        .unwrap_or_default();

    let base_labels = vec![
        vmi.status.node_name.clone(),
        vmi.metadata.namespace.clone(),
        vmi.metadata.name.clone(),
        migration_name,
    ];

    let mut results = vec![CollectorResult::new(
        &VMI_MIGRATION_START_TIME,
        base_labels.clone(),
        start.timestamp() as f64,
    )];

    if let (Some(end), true) = (state.end_timestamp, state.completed) {
        let status = if state.failed { "failed" } else { "succeeded" };
        let mut labels = base_labels;
        labels.push(status.to_string());
        results.push(CollectorResult::new(
            &VMI_MIGRATION_END_TIME,
            labels,
            end.timestamp() as f64,
        ));
    }

    results
}
