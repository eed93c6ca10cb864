//! Persistence seam for ingested network state.
//!
//! [`NetworkStore`] is what ingestors write through. Every write is an upsert keyed by the
//! entity's natural key, so replaying the same blocks for the same (device, snapshot) leaves the
//! store unchanged:
//!
//! | Entity | Natural key |
//! |---|---|
//! | [`Device`] | hostname (unique across snapshots) |
//! | [`InterfaceRow`] | (device, snapshot, name) |
//! | [`FactRow`] | (device, snapshot, kind, natural key) |
//!
//! Implementations must reject a fact whose interface reference belongs to another device or
//! snapshot.

use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};

use crate::{codec::BlockType, error::NetsnapError};

pub mod memory;

pub use memory::MemoryStore;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(SnapshotId);
id_type!(DeviceId);
id_type!(InterfaceId);

/// One ingestion run. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub label: Option<String>,
    /// Milliseconds since the unix epoch
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub hostname: String,
    pub model: Option<String>,
    pub software_version: Option<String>,
}

/// Mutable interface attributes. On upsert every `Some` field overwrites the stored value and
/// every `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceState {
    pub phy: Option<String>,
    pub protocol: Option<String>,
    pub admin_down: Option<bool>,
    pub ip_address: Option<String>,
    pub vpn_instance: Option<String>,
    pub in_util: Option<f64>,
    pub out_util: Option<f64>,
    pub in_errors: Option<u64>,
    pub out_errors: Option<u64>,
}

impl InterfaceState {
    pub fn merge(&mut self, update: &InterfaceState) {
        fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        take(&mut self.phy, &update.phy);
        take(&mut self.protocol, &update.protocol);
        take(&mut self.admin_down, &update.admin_down);
        take(&mut self.ip_address, &update.ip_address);
        take(&mut self.vpn_instance, &update.vpn_instance);
        take(&mut self.in_util, &update.in_util);
        take(&mut self.out_util, &update.out_util);
        take(&mut self.in_errors, &update.in_errors);
        take(&mut self.out_errors, &update.out_errors);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRow {
    pub id: InterfaceId,
    pub device_id: DeviceId,
    pub snapshot_id: SnapshotId,
    pub name: String,
    pub state: InterfaceState,
}

/// Kinds of satellite facts hanging off a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Hardware,
    Transceiver,
    Arp,
    LldpNeighbor,
    OspfPeer,
    BgpPeer,
    Route,
    Alarm,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Hardware => "hardware",
            FactKind::Transceiver => "transceiver",
            FactKind::Arp => "arp",
            FactKind::LldpNeighbor => "lldp_neighbor",
            FactKind::OspfPeer => "ospf_peer",
            FactKind::BgpPeer => "bgp_peer",
            FactKind::Route => "route",
            FactKind::Alarm => "alarm",
        }
    }

    /// Block type whose ingestor owns this kind.
    pub fn block_type(&self) -> BlockType {
        match self {
            FactKind::Hardware => BlockType::Device,
            FactKind::Transceiver => BlockType::OpticalModule,
            FactKind::Arp => BlockType::Arp,
            FactKind::LldpNeighbor => BlockType::LldpNeighbor,
            FactKind::OspfPeer => BlockType::OspfPeer,
            FactKind::BgpPeer => BlockType::BgpPeer,
            FactKind::Route => BlockType::RoutingTable,
            FactKind::Alarm => BlockType::Alarm,
        }
    }

    pub fn all() -> [FactKind; 8] {
        [
            FactKind::Hardware,
            FactKind::Transceiver,
            FactKind::Arp,
            FactKind::LldpNeighbor,
            FactKind::OspfPeer,
            FactKind::BgpPeer,
            FactKind::Route,
            FactKind::Alarm,
        ]
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FactKind {
    type Err = NetsnapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactKind::all()
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| NetsnapError::Store(format!("unknown fact kind '{s}'")))
    }
}

/// One satellite record scoped to a device and snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub device_id: DeviceId,
    pub snapshot_id: SnapshotId,
    pub kind: FactKind,
    /// Kind-specific discriminator, unique per (device, snapshot, kind)
    pub natural_key: String,
    pub interface_id: Option<InterfaceId>,
    pub payload: serde_json::Value,
}

/// Storage backend for snapshots, devices, interfaces and facts.
///
/// Methods return `Send` futures so a store handle can be moved into per-device tokio tasks.
pub trait NetworkStore: Clone + Send + Sync + 'static {
    fn create_snapshot(
        &self,
        label: Option<String>,
    ) -> impl Future<Output = Result<Snapshot, NetsnapError>> + Send;

    /// Device with `hostname`, created on first sighting.
    fn upsert_device(
        &self,
        hostname: &str,
    ) -> impl Future<Output = Result<Device, NetsnapError>> + Send;

    /// Give `device` a new hostname. When another device already owns `hostname` the two are
    /// merged into that one and the merged device is returned.
    fn rename_device(
        &self,
        device: DeviceId,
        hostname: &str,
    ) -> impl Future<Output = Result<Device, NetsnapError>> + Send;

    /// Overwrite model and software version where `Some`.
    fn correct_device(
        &self,
        device: DeviceId,
        model: Option<String>,
        software_version: Option<String>,
    ) -> impl Future<Output = Result<Device, NetsnapError>> + Send;

    fn device_by_hostname(
        &self,
        hostname: &str,
    ) -> impl Future<Output = Result<Option<Device>, NetsnapError>> + Send;

    fn upsert_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
        state: &InterfaceState,
    ) -> impl Future<Output = Result<InterfaceId, NetsnapError>> + Send;

    /// Exact-name lookup.
    fn find_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
    ) -> impl Future<Output = Result<Option<InterfaceId>, NetsnapError>> + Send;

    fn upsert_fact(&self, fact: FactRow)
        -> impl Future<Output = Result<(), NetsnapError>> + Send;

    fn interfaces(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
    ) -> impl Future<Output = Result<Vec<InterfaceRow>, NetsnapError>> + Send;

    /// Facts of one device and snapshot, optionally restricted to one kind.
    fn facts(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        kind: Option<FactKind>,
    ) -> impl Future<Output = Result<Vec<FactRow>, NetsnapError>> + Send;
}
