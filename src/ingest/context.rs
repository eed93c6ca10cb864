use std::collections::HashMap;

use crate::{
    error::NetsnapError,
    ifname::canonicalize,
    store::{Device, InterfaceId, NetworkStore, Snapshot},
};

/// A resolved interface: its store id and the name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRef {
    pub id: InterfaceId,
    pub name: String,
}

/// Scratch state for ingesting one device's blocks into one snapshot.
///
/// Owned by a single device task; nothing in here is shared.
#[derive(Debug)]
pub struct IngestionContext {
    snapshot: Snapshot,
    device: Device,
    interfaces: HashMap<String, InterfaceRef>,
    hits: usize,
    misses: usize,
}

impl IngestionContext {
    pub fn new(snapshot: Snapshot, device: Device) -> Self {
        IngestionContext {
            snapshot,
            device,
            interfaces: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Replace the device handle after an identity correction. A rename may merge devices and
    /// renumber interfaces, so the cache is dropped.
    pub fn set_device(&mut self, device: Device) {
        if device.id != self.device.id {
            self.interfaces.clear();
        }
        self.device = device;
    }

    /// Record an interface the current device just upserted.
    pub fn remember_interface(&mut self, name: &str, id: InterfaceId) {
        self.interfaces.insert(
            name.to_string(),
            InterfaceRef {
                id,
                name: name.to_string(),
            },
        );
    }

    /// Resolve an interface reference as printed by some table.
    ///
    /// Tries the cache, then the store, each first by the exact name and then by its canonical
    /// long form. Successful store lookups are cached under the printed name.
    pub async fn resolve_interface<S: NetworkStore>(
        &mut self,
        store: &S,
        name: &str,
    ) -> Result<Option<InterfaceRef>, NetsnapError> {
        let canonical = canonicalize(name).filter(|c| c != name);

        let cached = self
            .interfaces
            .get(name)
            .or_else(|| canonical.as_deref().and_then(|c| self.interfaces.get(c)))
            .cloned();
        if cached.is_some() {
            self.hits += 1;
            return Ok(cached);
        }

        let device = self.device.id;
        let snapshot = self.snapshot.id;
        let mut found = store
            .find_interface(device, snapshot, name)
            .await?
            .map(|id| InterfaceRef {
                id,
                name: name.to_string(),
            });
        if found.is_none() {
            if let Some(canonical) = canonical {
                found = store
                    .find_interface(device, snapshot, &canonical)
                    .await?
                    .map(|id| InterfaceRef {
                        id,
                        name: canonical,
                    });
            }
        }

        match &found {
            Some(iface) => {
                self.hits += 1;
                self.interfaces.insert(name.to_string(), iface.clone());
            }
            None => self.misses += 1,
        }
        Ok(found)
    }

    /// (hits, misses) of interface resolution so far.
    pub fn resolution_stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}
