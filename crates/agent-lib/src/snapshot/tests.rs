//! Snapshot loading and reload tests against real files

#[cfg(test)]
mod parse_tests {
    use crate::snapshot::{ClusterSnapshot, SnapshotError};

    const SNAPSHOT: &str = r#"{
        "vmis": [
            {
                "metadata": {"name": "vm-a", "namespace": "ns1", "uid": "uid-a"},
                "spec": {"networks": [{"name": "default", "pod": {}}]},
                "status": {"phase": "Running", "nodeName": "node01"}
            },
            {
                "metadata": {"name": "broken", "namespace": "ns1"},
                "spec": {"networks": "not-a-list"}
            },
            {
                "metadata": {"name": "vm-b", "namespace": "ns2"}
            }
        ],
        "pods": [
            {
                "metadata": {
                    "name": "virt-launcher-vm-a-xyz",
                    "namespace": "ns1",
                    "labels": {"kubevirt.io/created-by": "uid-a"}
                },
                "spec": {"nodeName": "node01"}
            }
        ],
        "clusterInstancetypes": [
            {"metadata": {"name": "u1.small", "labels": {"instancetype.kubevirt.io/vendor": "kubevirt.io"}}}
        ]
    }"#;

    #[test]
    fn test_malformed_vmi_is_skipped() {
        let parsed = ClusterSnapshot::from_json(SNAPSHOT).unwrap();

        assert_eq!(parsed.skipped_vmis, 1);
        let names: Vec<&str> = parsed
            .snapshot
            .vmis
            .iter()
            .map(|vmi| vmi.metadata.name.as_str())
            .collect();
        assert_eq!(names, vec!["vm-a", "vm-b"]);
        assert_eq!(parsed.snapshot.pods.len(), 1);
        assert_eq!(parsed.snapshot.cluster_instancetypes.len(), 1);
        assert!(parsed.snapshot.migrations.is_empty());
    }

    #[test]
    fn test_find_vmi() {
        let parsed = ClusterSnapshot::from_json(SNAPSHOT).unwrap();

        let vmi = parsed.snapshot.find_vmi("ns1", "vm-a").unwrap();
        assert_eq!(vmi.status.node_name, "node01");
        assert!(parsed.snapshot.find_vmi("ns2", "vm-a").is_none());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let err = ClusterSnapshot::from_json("{\"pods\": 42}").unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(_)));

        tokio_test::assert_err!(ClusterSnapshot::from_json("not json"));
        tokio_test::assert_ok!(ClusterSnapshot::from_json("{}"));
    }
}

#[cfg(test)]
mod store_tests {
    use crate::health::{Component, ComponentStatus, HealthRegistry, SNAPSHOT_NOT_LOADED};
    use crate::snapshot::{ClusterSnapshot, ReloadLoopBuilder, SnapshotError, SnapshotStore};
    use crate::models::VirtualMachineInstance;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::fs;

    fn snapshot_json(vmi_names: &[&str]) -> String {
        let snapshot = ClusterSnapshot {
            vmis: vmi_names
                .iter()
                .map(|name| VirtualMachineInstance::new("test-ns", *name))
                .collect(),
            ..Default::default()
        };
        serde_json::to_string(&snapshot).unwrap()
    }

    #[tokio::test]
    async fn test_store_starts_empty() {
        let store = SnapshotStore::new("/nonexistent/snapshot.json");
        let current = store.current();

        assert!(!current.is_loaded());
        assert!(current.snapshot.vmis.is_empty());
    }

    #[tokio::test]
    async fn test_reload_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        fs::write(&path, snapshot_json(&["vm-a", "vm-b"])).await.unwrap();

        let store = SnapshotStore::new(&path);
        let loaded = store.reload().await.unwrap();

        assert!(loaded.is_loaded());
        assert_eq!(loaded.snapshot.vmis.len(), 2);
        assert_eq!(store.current().snapshot.vmis.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        fs::write(&path, snapshot_json(&["vm-a"])).await.unwrap();

        let store = SnapshotStore::new(&path);
        store.reload().await.unwrap();

        fs::write(&path, "{ truncated").await.unwrap();
        let err = store.reload().await.unwrap_err();

        assert!(matches!(err, SnapshotError::Parse(_)));
        assert_eq!(store.current().snapshot.vmis.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("missing.json"));

        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }

    #[tokio::test]
    async fn test_in_memory_store_has_no_source() {
        let store = SnapshotStore::from_snapshot(ClusterSnapshot::default());

        assert!(store.current().is_loaded());
        assert!(matches!(store.reload().await, Err(SnapshotError::NoSource)));
    }

    #[tokio::test]
    async fn test_reload_once_drives_health_and_readiness() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        let health = HealthRegistry::new();
        for component in Component::ALL {
            health.register(component).await;
        }

        let reload_loop = ReloadLoopBuilder::new()
            .store(SnapshotStore::new(&path))
            .health(health.clone())
            .build()
            .unwrap();

        // Missing file at startup: unhealthy and not ready
        assert!(!reload_loop.reload_once().await);
        let snapshot_health = health.component(Component::Snapshot).await.unwrap();
        assert_eq!(snapshot_health.status, ComponentStatus::Unhealthy);
        let readiness = health.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some(SNAPSHOT_NOT_LOADED));

        fs::write(&path, snapshot_json(&["vm-a"])).await.unwrap();
        assert!(reload_loop.reload_once().await);
        let snapshot_health = health.component(Component::Snapshot).await.unwrap();
        assert_eq!(snapshot_health.status, ComponentStatus::Healthy);
        assert!(health.readiness().await.ready);

        // A later failure degrades but the previous snapshot keeps the agent ready
        fs::write(&path, "{\"vmis\": {}}").await.unwrap();
        assert!(!reload_loop.reload_once().await);
        let snapshot_health = health.component(Component::Snapshot).await.unwrap();
        assert_eq!(snapshot_health.status, ComponentStatus::Degraded);
        assert!(health.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_failed_startup_load_leaves_agent_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let health = HealthRegistry::new();
        health.register(Component::Snapshot).await;

        let reload_loop = ReloadLoopBuilder::new()
            .store(SnapshotStore::new(temp_dir.path().join("missing.json")))
            .health(health.clone())
            .build()
            .unwrap();

        assert!(!reload_loop.reload_once().await);
        assert!(!reload_loop.reload_once().await);

        assert!(!health.readiness().await.ready);
        assert_eq!(health.snapshot_loaded_at().await, None);
    }

    #[tokio::test]
    async fn test_reload_loop_reacts_to_trigger_and_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        fs::write(&path, snapshot_json(&["vm-a"])).await.unwrap();

        let store = SnapshotStore::new(&path);
        store.reload().await.unwrap();

        let (trigger_tx, trigger_rx) = tokio::sync::mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

        let reload_loop = ReloadLoopBuilder::new()
            .store(store.clone())
            .interval(Duration::from_secs(3600))
            .jitter(Duration::ZERO)
            .triggers(trigger_rx)
            .build()
            .unwrap();
        let handle = tokio::spawn(reload_loop.run(shutdown_rx));

        fs::write(&path, snapshot_json(&["vm-a", "vm-b", "vm-c"]))
            .await
            .unwrap();
        trigger_tx.send(()).await.unwrap();

        let mut reloaded = false;
        for _ in 0..50 {
            if store.current().snapshot.vmis.len() == 3 {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(reloaded);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
