//! `kubevirt_vmi_non_evictable` derivation

use super::{CollectorResult, StatsConfig, VMI_NON_EVICTABLE};
use crate::models::{conditions, EvictionStrategy, VirtualMachineInstance};

/// True when the VMI asks to be live migrated on eviction but cannot be
pub fn is_non_evictable(vmi: &VirtualMachineInstance, config: &StatsConfig) -> bool {
    let strategy = vmi
        .spec
        .eviction_strategy
        .or(config.default_eviction_strategy);

    strategy == Some(EvictionStrategy::LiveMigrate)
        && vmi.condition_status(conditions::LIVE_MIGRATABLE) != Some("True")
}

pub fn collect_eviction_blocker(
    vmi: &VirtualMachineInstance,
    config: &StatsConfig,
) -> CollectorResult {
    let value = if is_non_evictable(vmi, config) { 1.0 } else { 0.0 };

    CollectorResult::new(
        &VMI_NON_EVICTABLE,
        vec![
            vmi.status.node_name.clone(),
            vmi.metadata.namespace.clone(),
            vmi.metadata.name.clone(),
        ],
        value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VmiCondition;

    fn vmi_for_eviction(
        strategy: Option<EvictionStrategy>,
        migratable: Option<&str>,
    ) -> VirtualMachineInstance {
        let mut vmi = VirtualMachineInstance::new("test-ns", "testvmi");
        vmi.status.node_name = "testNode".to_string();
        vmi.spec.eviction_strategy = strategy;
        if let Some(status) = migratable {
            vmi.status.conditions.push(VmiCondition {
                condition_type: conditions::LIVE_MIGRATABLE.to_string(),
                status: status.to_string(),
                reason: None,
            });
        }
        vmi
    }

    #[test]
    fn test_eviction_blocker_values() {
        let live_migrate = Some(EvictionStrategy::LiveMigrate);
        let cases = [
            (live_migrate, Some("False"), 1.0),
            (live_migrate, None, 1.0),
            (live_migrate, Some("True"), 0.0),
            (None, Some("False"), 0.0),
            (None, Some("True"), 0.0),
            (None, None, 0.0),
            (Some(EvictionStrategy::LiveMigrateIfPossible), Some("False"), 0.0),
        ];

        for (strategy, migratable, expected) in cases {
            let vmi = vmi_for_eviction(strategy, migratable);
            let result = collect_eviction_blocker(&vmi, &StatsConfig::default());

            assert_eq!(result.family.name, "kubevirt_vmi_non_evictable");
            assert_eq!(result.labels, vec!["testNode", "test-ns", "testvmi"]);
            assert_eq!(result.value, expected, "{:?} / {:?}", strategy, migratable);
        }
    }

    #[test]
    fn test_cluster_default_strategy_applies() {
        let config = StatsConfig {
            default_eviction_strategy: Some(EvictionStrategy::LiveMigrate),
        };

        let vmi = vmi_for_eviction(None, Some("False"));
        assert!(is_non_evictable(&vmi, &config));

        // An explicit VMI strategy wins over the cluster default
        let vmi = vmi_for_eviction(Some(EvictionStrategy::None), Some("False"));
        assert!(!is_non_evictable(&vmi, &config));
    }
}
