//! Batch runs: discovery, per-device isolation and the run summary.

use tempfile::TempDir;
use test_log::test;

use netsnap_core::{
    codec::BlockType,
    config::NetsnapConfig,
    pipeline::{run_batch, DeviceStatus},
    store::{
        Device, DeviceId, FactKind, FactRow, InterfaceId, InterfaceRow, InterfaceState,
        MemoryStore, NetworkStore, Snapshot, SnapshotId,
    },
    NetsnapError,
};

mod common;
use common::{create_capture_root, write_device, ACCESS_CAPTURE, CORE_CAPTURE, CORE_FACTS};

/// Memory store that refuses one hostname.
#[derive(Clone)]
struct RefusingStore {
    inner: MemoryStore,
    refused: &'static str,
}

impl NetworkStore for RefusingStore {
    async fn create_snapshot(&self, label: Option<String>) -> Result<Snapshot, NetsnapError> {
        self.inner.create_snapshot(label).await
    }

    async fn upsert_device(&self, hostname: &str) -> Result<Device, NetsnapError> {
        if hostname == self.refused {
            return Err(NetsnapError::Store(format!("{hostname} is refused")));
        }
        self.inner.upsert_device(hostname).await
    }

    async fn rename_device(&self, device: DeviceId, hostname: &str) -> Result<Device, NetsnapError> {
        self.inner.rename_device(device, hostname).await
    }

    async fn correct_device(
        &self,
        device: DeviceId,
        model: Option<String>,
        software_version: Option<String>,
    ) -> Result<Device, NetsnapError> {
        self.inner
            .correct_device(device, model, software_version)
            .await
    }

    async fn device_by_hostname(&self, hostname: &str) -> Result<Option<Device>, NetsnapError> {
        self.inner.device_by_hostname(hostname).await
    }

    async fn upsert_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
        state: &InterfaceState,
    ) -> Result<InterfaceId, NetsnapError> {
        self.inner
            .upsert_interface(device, snapshot, name, state)
            .await
    }

    async fn find_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
    ) -> Result<Option<InterfaceId>, NetsnapError> {
        self.inner.find_interface(device, snapshot, name).await
    }

    async fn upsert_fact(&self, fact: FactRow) -> Result<(), NetsnapError> {
        self.inner.upsert_fact(fact).await
    }

    async fn interfaces(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
    ) -> Result<Vec<InterfaceRow>, NetsnapError> {
        self.inner.interfaces(device, snapshot).await
    }

    async fn facts(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        kind: Option<FactKind>,
    ) -> Result<Vec<FactRow>, NetsnapError> {
        self.inner.facts(device, snapshot, kind).await
    }
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn batch_ingests_every_device() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_capture_root(
        &temp_dir,
        &[("core-01", CORE_CAPTURE), ("access-sw", ACCESS_CAPTURE)],
    );
    let store = MemoryStore::new();
    let summary = run_batch(
        &root,
        &NetsnapConfig::default(),
        store.clone(),
        Some("nightly".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(summary.snapshot.label.as_deref(), Some("nightly"));
    assert_eq!(summary.devices.len(), 2);
    assert_eq!(summary.failed_devices(), 0);
    assert!(summary
        .devices
        .iter()
        .all(|d| d.status == DeviceStatus::Ok && d.digest.as_ref().map(|h| h.len()) == Some(64)));

    // Sorted by folder name: access-sw, core-01
    assert_eq!(summary.devices[0].hostname.as_deref(), Some("ACC-07"));
    assert_eq!(summary.devices[1].hostname.as_deref(), Some("CORE-01"));
    assert_eq!(summary.devices[1].skipped_records(), 1);

    let by_type = summary.blocks_by_type();
    assert_eq!(by_type[&BlockType::Arp], 2);
    assert_eq!(by_type[&BlockType::Sysname], 2);
    assert_eq!(by_type[&BlockType::Version], 1);

    assert_eq!(store.device_count(), 2);
    assert_eq!(store.fact_count(), CORE_FACTS + 1);
    let rendered = summary.to_string();
    assert!(rendered.contains("2 devices"));
    assert!(rendered.contains("CORE-01: ok"));
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn failing_device_does_not_stop_siblings() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_capture_root(
        &temp_dir,
        &[("core-01", CORE_CAPTURE), ("access-sw", ACCESS_CAPTURE)],
    );
    let store = RefusingStore {
        inner: MemoryStore::new(),
        refused: "access-sw",
    };
    let config = NetsnapConfig {
        max_concurrent_devices: 1,
        ..Default::default()
    };
    let summary = run_batch(&root, &config, store.clone(), None).await.unwrap();

    assert_eq!(summary.failed_devices(), 1);
    assert!(matches!(summary.devices[0].status, DeviceStatus::Failed(ref r) if r.contains("refused")));
    assert_eq!(summary.devices[1].status, DeviceStatus::Ok);
    assert_eq!(store.inner.fact_count(), CORE_FACTS);
}

#[test(tokio::test)]
async fn exhausted_error_budget_keeps_partial_results() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_capture_root(&temp_dir, &[]);
    write_device(
        &root,
        "edge-9",
        "\
Interface                   PHY   Protocol  InUti OutUti   inErrors  outErrors
GigabitEthernet0/0/1        up    up        0.01%  0.01%          0          0

IP ADDRESS      MAC ADDRESS     EXPIRE(M) TYPE        INTERFACE   VPN-INSTANCE
10.1.1.1        00e0-fc12-3456  20        D-0         GE0/0/1
10.1.1.2        00e0-fc12-3457  99999999999 D-0       GE0/0/1
10.1.1.3        00e0-fc12-3458  99999999999 D-0       GE0/0/1
 sysname NEVER-SEEN
",
    );
    let store = MemoryStore::new();
    let config = NetsnapConfig {
        max_consecutive_errors: 2,
        ..Default::default()
    };
    let summary = run_batch(&root, &config, store.clone(), None).await.unwrap();

    let device = &summary.devices[0];
    assert!(matches!(device.status, DeviceStatus::Aborted(_)));
    assert_eq!(device.hostname.as_deref(), Some("edge-9"));
    assert_eq!(device.parse_errors(), 2);
    assert_eq!(store.interface_count(), 1);
    assert_eq!(store.fact_count(), 1);
}

#[test(tokio::test)]
async fn disabled_parsers_are_not_run() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_capture_root(&temp_dir, &[("core-01", CORE_CAPTURE)]);
    let mut config = NetsnapConfig::default();
    config.enabled_parsers.remove(BlockType::RoutingTable);
    let store = MemoryStore::new();
    let summary = run_batch(&root, &config, store.clone(), None).await.unwrap();

    assert!(!summary.blocks_by_type().contains_key(&BlockType::RoutingTable));
    assert_eq!(store.fact_count(), CORE_FACTS - 2);
}
