use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use super::{
    Device, DeviceId, FactKind, FactRow, InterfaceId, InterfaceRow, InterfaceState, NetworkStore,
    Snapshot, SnapshotId,
};
use crate::{codec::diagnostic::now_millis, error::NetsnapError};

type InterfaceKey = (DeviceId, SnapshotId, String);
type FactKey = (DeviceId, SnapshotId, FactKind, String);

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    snapshots: Vec<Snapshot>,
    devices: BTreeMap<DeviceId, Device>,
    interfaces: BTreeMap<InterfaceKey, InterfaceRow>,
    /// Owner of every live interface id
    interface_owners: HashMap<InterfaceId, (DeviceId, SnapshotId)>,
    facts: BTreeMap<FactKey, FactRow>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn device_named(&self, hostname: &str) -> Option<&Device> {
        self.devices.values().find(|d| d.hostname == hostname)
    }

    fn device(&self, id: DeviceId) -> Result<&Device, NetsnapError> {
        self.devices
            .get(&id)
            .ok_or_else(|| NetsnapError::NotFound(format!("device {id}")))
    }

    /// Move every interface and fact of `from` onto `into`. Rows from `from` win on key clashes.
    fn merge_devices(&mut self, from: DeviceId, into: DeviceId) {
        let mut remap: HashMap<InterfaceId, InterfaceId> = HashMap::new();
        let moved: Vec<InterfaceKey> = self
            .interfaces
            .keys()
            .filter(|(device, _, _)| *device == from)
            .cloned()
            .collect();
        for key in moved {
            let Some(mut row) = self.interfaces.remove(&key) else {
                continue;
            };
            let (_, snapshot, name) = key;
            let target = (into, snapshot, name);
            match self.interfaces.get_mut(&target) {
                Some(existing) => {
                    existing.state.merge(&row.state);
                    remap.insert(row.id, existing.id);
                    self.interface_owners.remove(&row.id);
                }
                None => {
                    row.device_id = into;
                    self.interface_owners.insert(row.id, (into, snapshot));
                    self.interfaces.insert(target, row);
                }
            }
        }

        let moved: Vec<FactKey> = self
            .facts
            .keys()
            .filter(|(device, _, _, _)| *device == from)
            .cloned()
            .collect();
        for key in moved {
            let Some(mut fact) = self.facts.remove(&key) else {
                continue;
            };
            let (_, snapshot, kind, natural_key) = key;
            fact.device_id = into;
            fact.interface_id = fact
                .interface_id
                .map(|id| remap.get(&id).copied().unwrap_or(id));
            self.facts.insert((into, snapshot, kind, natural_key), fact);
        }
        self.devices.remove(&from);
    }
}

/// In-process [`NetworkStore`]. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<RwLock<Tables>>);

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn device_count(&self) -> usize {
        self.0.read().devices.len()
    }

    pub fn interface_count(&self) -> usize {
        self.0.read().interfaces.len()
    }

    pub fn fact_count(&self) -> usize {
        self.0.read().facts.len()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.0.read().snapshots.clone()
    }
}

impl NetworkStore for MemoryStore {
    async fn create_snapshot(&self, label: Option<String>) -> Result<Snapshot, NetsnapError> {
        let mut tables = self.0.write();
        let snapshot = Snapshot {
            id: SnapshotId(tables.next_id()),
            label,
            created_at: now_millis(),
        };
        tables.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn upsert_device(&self, hostname: &str) -> Result<Device, NetsnapError> {
        if hostname.trim().is_empty() {
            return Err(NetsnapError::Store("device hostname is empty".to_string()));
        }
        let mut tables = self.0.write();
        if let Some(device) = tables.device_named(hostname) {
            return Ok(device.clone());
        }
        let device = Device {
            id: DeviceId(tables.next_id()),
            hostname: hostname.to_string(),
            model: None,
            software_version: None,
        };
        tables.devices.insert(device.id, device.clone());
        Ok(device)
    }

    async fn rename_device(&self, device: DeviceId, hostname: &str) -> Result<Device, NetsnapError> {
        if hostname.trim().is_empty() {
            return Err(NetsnapError::Store("device hostname is empty".to_string()));
        }
        let mut tables = self.0.write();
        let current = tables.device(device)?.clone();
        if current.hostname == hostname {
            return Ok(current);
        }
        match tables.device_named(hostname).map(|d| d.id) {
            Some(owner) => {
                tables.merge_devices(device, owner);
                let merged = tables.device(owner)?.clone();
                let merged = Device {
                    model: merged.model.or(current.model),
                    software_version: merged.software_version.or(current.software_version),
                    ..merged
                };
                tables.devices.insert(owner, merged.clone());
                Ok(merged)
            }
            None => {
                let renamed = Device {
                    hostname: hostname.to_string(),
                    ..current
                };
                tables.devices.insert(device, renamed.clone());
                Ok(renamed)
            }
        }
    }

    async fn correct_device(
        &self,
        device: DeviceId,
        model: Option<String>,
        software_version: Option<String>,
    ) -> Result<Device, NetsnapError> {
        let mut tables = self.0.write();
        let entry = tables
            .devices
            .get_mut(&device)
            .ok_or_else(|| NetsnapError::NotFound(format!("device {device}")))?;
        if model.is_some() {
            entry.model = model;
        }
        if software_version.is_some() {
            entry.software_version = software_version;
        }
        Ok(entry.clone())
    }

    async fn device_by_hostname(&self, hostname: &str) -> Result<Option<Device>, NetsnapError> {
        Ok(self.0.read().device_named(hostname).cloned())
    }

    async fn upsert_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
        state: &InterfaceState,
    ) -> Result<InterfaceId, NetsnapError> {
        let mut tables = self.0.write();
        tables.device(device)?;
        let key = (device, snapshot, name.to_string());
        if let Some(row) = tables.interfaces.get_mut(&key) {
            row.state.merge(state);
            return Ok(row.id);
        }
        let id = InterfaceId(tables.next_id());
        tables.interface_owners.insert(id, (device, snapshot));
        tables.interfaces.insert(
            key,
            InterfaceRow {
                id,
                device_id: device,
                snapshot_id: snapshot,
                name: name.to_string(),
                state: state.clone(),
            },
        );
        Ok(id)
    }

    async fn find_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
    ) -> Result<Option<InterfaceId>, NetsnapError> {
        Ok(self
            .0
            .read()
            .interfaces
            .get(&(device, snapshot, name.to_string()))
            .map(|row| row.id))
    }

    async fn upsert_fact(&self, fact: FactRow) -> Result<(), NetsnapError> {
        let mut tables = self.0.write();
        if let Some(interface) = fact.interface_id {
            let owner = tables.interface_owners.get(&interface);
            if owner != Some(&(fact.device_id, fact.snapshot_id)) {
                return Err(NetsnapError::Store(format!(
                    "interface {interface} does not belong to device {} in snapshot {}",
                    fact.device_id, fact.snapshot_id
                )));
            }
        }
        let key = (
            fact.device_id,
            fact.snapshot_id,
            fact.kind,
            fact.natural_key.clone(),
        );
        tables.facts.insert(key, fact);
        Ok(())
    }

    async fn interfaces(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
    ) -> Result<Vec<InterfaceRow>, NetsnapError> {
        Ok(self
            .0
            .read()
            .interfaces
            .values()
            .filter(|row| row.device_id == device && row.snapshot_id == snapshot)
            .cloned()
            .collect())
    }

    async fn facts(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        kind: Option<FactKind>,
    ) -> Result<Vec<FactRow>, NetsnapError> {
        Ok(self
            .0
            .read()
            .facts
            .values()
            .filter(|f| f.device_id == device && f.snapshot_id == snapshot)
            .filter(|f| kind.map_or(true, |k| f.kind == k))
            .cloned()
            .collect())
    }
}
