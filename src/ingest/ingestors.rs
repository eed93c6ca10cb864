use serde::Serialize;
use std::future::Future;

use super::{natural_key, IngestReport, IngestionContext, InterfaceRef, KeyPart};
use crate::{
    codec::{BlockRecords, BlockType, ParsedBlock},
    error::NetsnapError,
    ifname::canonicalize,
    store::{FactKind, FactRow, InterfaceId, InterfaceState, NetworkStore},
};

pub const IDENTITY_PRIORITY: u16 = 0;
pub const INTERFACE_PRIORITY: u16 = 10;
pub const HARDWARE_PRIORITY: u16 = 20;
pub const INTERFACE_FACT_PRIORITY: u16 = 30;
pub const ROUTING_PRIORITY: u16 = 40;
pub const ALARM_PRIORITY: u16 = 50;

/// Maps one block type into store upserts.
pub trait Ingestor {
    fn block_type(&self) -> BlockType;

    /// Ascending: lower priorities are ingested first.
    fn priority(&self) -> u16;

    fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> impl Future<Output = Result<IngestReport, NetsnapError>> + Send;
}

fn mismatch(expected: BlockType, block: &ParsedBlock) -> NetsnapError {
    NetsnapError::Ingest(format!(
        "{expected} ingestor was handed a {} block",
        block.records.block_type()
    ))
}

/// Shared plumbing for ingestors that write satellite facts.
struct FactWriter<'a, S> {
    store: &'a S,
    ctx: &'a mut IngestionContext,
    kind: FactKind,
    report: IngestReport,
}

impl<'a, S: NetworkStore> FactWriter<'a, S> {
    fn new(store: &'a S, ctx: &'a mut IngestionContext, kind: FactKind) -> Self {
        FactWriter {
            store,
            ctx,
            kind,
            report: IngestReport::new(kind.block_type()),
        }
    }

    /// `None` means the record must be skipped; the skip is already reported.
    async fn required_interface(
        &mut self,
        name: &str,
        record: &str,
    ) -> Result<Option<InterfaceRef>, NetsnapError> {
        let found = self.ctx.resolve_interface(self.store, name).await?;
        if found.is_none() {
            self.report.skip(format!(
                "{} {record} skipped: interface '{name}' is unknown on {}",
                self.kind,
                self.ctx.device().hostname
            ));
        }
        Ok(found)
    }

    async fn optional_interface(
        &mut self,
        name: Option<&str>,
    ) -> Result<Option<InterfaceId>, NetsnapError> {
        let Some(name) = name else {
            return Ok(None);
        };
        let found = self.ctx.resolve_interface(self.store, name).await?;
        if found.is_none() {
            tracing::debug!("[{}] interface '{}' not attached", self.kind, name);
        }
        Ok(found.map(|iface| iface.id))
    }

    async fn put<T: Serialize + Sync>(
        &mut self,
        key: Result<String, NetsnapError>,
        interface_id: Option<InterfaceId>,
        record: &T,
    ) -> Result<(), NetsnapError> {
        let natural_key = match key {
            Ok(key) => key,
            Err(e) => {
                self.report.reject(e);
                return Ok(());
            }
        };
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(e) => {
                self.report.reject(e.into());
                return Ok(());
            }
        };
        self.store
            .upsert_fact(FactRow {
                device_id: self.ctx.device().id,
                snapshot_id: self.ctx.snapshot().id,
                kind: self.kind,
                natural_key,
                interface_id,
                payload,
            })
            .await?;
        self.report.upserted += 1;
        Ok(())
    }

    fn finish(self) -> IngestReport {
        self.report
    }
}

// ----- identity -----

#[derive(Debug, Clone, Copy, Default)]
pub struct SysnameIngestor;

impl Ingestor for SysnameIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::Sysname
    }

    fn priority(&self) -> u16 {
        IDENTITY_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::Sysname(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut report = IngestReport::new(self.block_type());
        for record in records {
            let current = ctx.device().clone();
            if current.hostname != record.hostname {
                let device = store.rename_device(current.id, &record.hostname).await?;
                tracing::info!(
                    "[SysnameIngestor] device '{}' identified as '{}'",
                    current.hostname,
                    device.hostname
                );
                ctx.set_device(device);
            }
            report.upserted += 1;
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VersionIngestor;

impl Ingestor for VersionIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::Version
    }

    fn priority(&self) -> u16 {
        IDENTITY_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::Version(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut report = IngestReport::new(self.block_type());
        for record in records {
            if record.model.is_none() && record.software_version.is_none() {
                report.reject(NetsnapError::Ingest(
                    "version record names neither model nor software version".to_string(),
                ));
                continue;
            }
            let device = store
                .correct_device(
                    ctx.device().id,
                    record.model.clone(),
                    record.software_version.clone(),
                )
                .await?;
            ctx.set_device(device);
            report.upserted += 1;
        }
        Ok(report)
    }
}

// ----- interfaces -----

/// Upserts interfaces from either brief table. Names are stored in canonical long form when the
/// printed form is an abbreviation.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceIngestor(BlockType);

impl InterfaceIngestor {
    pub fn brief() -> Self {
        InterfaceIngestor(BlockType::InterfaceBrief)
    }

    pub fn ip_brief() -> Self {
        InterfaceIngestor(BlockType::IpInterfaceBrief)
    }
}

impl Ingestor for InterfaceIngestor {
    fn block_type(&self) -> BlockType {
        self.0
    }

    fn priority(&self) -> u16 {
        INTERFACE_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let records = match (&block.records, self.0) {
            (BlockRecords::InterfaceBrief(r), BlockType::InterfaceBrief) => r,
            (BlockRecords::IpInterfaceBrief(r), BlockType::IpInterfaceBrief) => r,
            _ => return Err(mismatch(self.0, block)),
        };
        let mut report = IngestReport::new(self.0);
        for record in records {
            let name = canonicalize(&record.name).unwrap_or_else(|| record.name.clone());
            if let Err(e) = natural_key(&[KeyPart::Required("name", &name)]) {
                report.reject(e);
                continue;
            }
            let state = InterfaceState {
                phy: record.phy.clone(),
                protocol: record.protocol.clone(),
                admin_down: Some(record.admin_down),
                ip_address: record.ip_address.clone(),
                vpn_instance: record.vpn_instance.clone(),
                in_util: record.in_util,
                out_util: record.out_util,
                in_errors: record.in_errors,
                out_errors: record.out_errors,
            };
            let id = store
                .upsert_interface(ctx.device().id, ctx.snapshot().id, &name, &state)
                .await?;
            ctx.remember_interface(&name, id);
            if name != record.name {
                ctx.remember_interface(&record.name, id);
            }
            report.upserted += 1;
        }
        Ok(report)
    }
}

// ----- satellite facts -----

#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareIngestor;

impl Ingestor for HardwareIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::Device
    }

    fn priority(&self) -> u16 {
        HARDWARE_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::Device(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::Hardware);
        for record in records {
            let key = natural_key(&[
                KeyPart::Required("slot", &record.slot),
                KeyPart::Optional(record.sub_slot.as_deref()),
            ]);
            writer.put(key, None, record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransceiverIngestor;

impl Ingestor for TransceiverIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::OpticalModule
    }

    fn priority(&self) -> u16 {
        INTERFACE_FACT_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::OpticalModule(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::Transceiver);
        for record in records {
            let Some(iface) = writer.required_interface(&record.port, &record.port).await? else {
                continue;
            };
            let key = natural_key(&[KeyPart::Required("port", &iface.name)]);
            writer.put(key, Some(iface.id), record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArpIngestor;

impl Ingestor for ArpIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::Arp
    }

    fn priority(&self) -> u16 {
        INTERFACE_FACT_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::Arp(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::Arp);
        for record in records {
            let Some(iface) = writer.required_interface(&record.interface, &record.ip).await?
            else {
                continue;
            };
            let key = natural_key(&[
                KeyPart::Required("ip", &record.ip),
                KeyPart::Optional(record.vpn_instance.as_deref()),
            ]);
            writer.put(key, Some(iface.id), record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LldpNeighborIngestor;

impl Ingestor for LldpNeighborIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::LldpNeighbor
    }

    fn priority(&self) -> u16 {
        INTERFACE_FACT_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::LldpNeighbor(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::LldpNeighbor);
        for record in records {
            let Some(iface) = writer
                .required_interface(&record.local_interface, &record.neighbor_device)
                .await?
            else {
                continue;
            };
            let key = natural_key(&[
                KeyPart::Required("local interface", &iface.name),
                KeyPart::Required("neighbor device", &record.neighbor_device),
                KeyPart::Required("neighbor interface", &record.neighbor_interface),
            ]);
            writer.put(key, Some(iface.id), record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OspfPeerIngestor;

impl Ingestor for OspfPeerIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::OspfPeer
    }

    fn priority(&self) -> u16 {
        INTERFACE_FACT_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::OspfPeer(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::OspfPeer);
        for record in records {
            let Some(iface) = writer
                .required_interface(&record.interface, &record.neighbor_id)
                .await?
            else {
                continue;
            };
            let key = natural_key(&[
                KeyPart::Required("area", &record.area),
                KeyPart::Required("neighbor id", &record.neighbor_id),
                KeyPart::Required("interface", &iface.name),
            ]);
            writer.put(key, Some(iface.id), record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteIngestor;

impl Ingestor for RouteIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::RoutingTable
    }

    fn priority(&self) -> u16 {
        ROUTING_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::RoutingTable(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::Route);
        for record in records {
            let interface_id = writer.optional_interface(Some(&record.interface)).await?;
            let key = natural_key(&[
                KeyPart::Required("table", &record.table),
                KeyPart::Required("destination", &record.destination),
                KeyPart::Required("next hop", &record.next_hop),
            ]);
            writer.put(key, interface_id, record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BgpPeerIngestor;

impl Ingestor for BgpPeerIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::BgpPeer
    }

    fn priority(&self) -> u16 {
        ROUTING_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::BgpPeer(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::BgpPeer);
        for record in records {
            let key = natural_key(&[
                KeyPart::Optional(record.vpn_instance.as_deref()),
                KeyPart::Required("peer", &record.peer),
                KeyPart::Required("address family", &record.address_family),
            ]);
            writer.put(key, None, record).await?;
        }
        Ok(writer.finish())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlarmIngestor;

impl Ingestor for AlarmIngestor {
    fn block_type(&self) -> BlockType {
        BlockType::Alarm
    }

    fn priority(&self) -> u16 {
        ALARM_PRIORITY
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        let BlockRecords::Alarm(records) = &block.records else {
            return Err(mismatch(self.block_type(), block));
        };
        let mut writer = FactWriter::new(store, ctx, FactKind::Alarm);
        for record in records {
            let interface_id = writer
                .optional_interface(record.interface.as_deref())
                .await?;
            let sequence = record.sequence.to_string();
            let key = natural_key(&[
                KeyPart::Required("sequence", &sequence),
                KeyPart::Required("alarm id", &record.alarm_id),
            ]);
            writer.put(key, interface_id, record).await?;
        }
        Ok(writer.finish())
    }
}

// ----- closed set -----

/// Closed set of built-in ingestors, one per block type.
#[derive(Debug, Clone, Copy)]
pub enum AnyIngestor {
    Sysname(SysnameIngestor),
    Version(VersionIngestor),
    InterfaceBrief(InterfaceIngestor),
    IpInterfaceBrief(InterfaceIngestor),
    Device(HardwareIngestor),
    OpticalModule(TransceiverIngestor),
    Arp(ArpIngestor),
    LldpNeighbor(LldpNeighborIngestor),
    OspfPeer(OspfPeerIngestor),
    BgpPeer(BgpPeerIngestor),
    RoutingTable(RouteIngestor),
    Alarm(AlarmIngestor),
}

macro_rules! dispatch {
    ($value:expr, $ingestor:ident => $body:expr) => {
        match $value {
            AnyIngestor::Sysname($ingestor) => $body,
            AnyIngestor::Version($ingestor) => $body,
            AnyIngestor::InterfaceBrief($ingestor) => $body,
            AnyIngestor::IpInterfaceBrief($ingestor) => $body,
            AnyIngestor::Device($ingestor) => $body,
            AnyIngestor::OpticalModule($ingestor) => $body,
            AnyIngestor::Arp($ingestor) => $body,
            AnyIngestor::LldpNeighbor($ingestor) => $body,
            AnyIngestor::OspfPeer($ingestor) => $body,
            AnyIngestor::BgpPeer($ingestor) => $body,
            AnyIngestor::RoutingTable($ingestor) => $body,
            AnyIngestor::Alarm($ingestor) => $body,
        }
    };
}

impl AnyIngestor {
    pub fn for_block(block_type: BlockType) -> AnyIngestor {
        match block_type {
            BlockType::Sysname => AnyIngestor::Sysname(SysnameIngestor),
            BlockType::Version => AnyIngestor::Version(VersionIngestor),
            BlockType::InterfaceBrief => AnyIngestor::InterfaceBrief(InterfaceIngestor::brief()),
            BlockType::IpInterfaceBrief => {
                AnyIngestor::IpInterfaceBrief(InterfaceIngestor::ip_brief())
            }
            BlockType::Device => AnyIngestor::Device(HardwareIngestor),
            BlockType::OpticalModule => AnyIngestor::OpticalModule(TransceiverIngestor),
            BlockType::Arp => AnyIngestor::Arp(ArpIngestor),
            BlockType::LldpNeighbor => AnyIngestor::LldpNeighbor(LldpNeighborIngestor),
            BlockType::OspfPeer => AnyIngestor::OspfPeer(OspfPeerIngestor),
            BlockType::BgpPeer => AnyIngestor::BgpPeer(BgpPeerIngestor),
            BlockType::RoutingTable => AnyIngestor::RoutingTable(RouteIngestor),
            BlockType::Alarm => AnyIngestor::Alarm(AlarmIngestor),
        }
    }
}

impl Ingestor for AnyIngestor {
    fn block_type(&self) -> BlockType {
        dispatch!(self, i => i.block_type())
    }

    fn priority(&self) -> u16 {
        dispatch!(self, i => i.priority())
    }

    async fn ingest<S: NetworkStore>(
        &self,
        block: &ParsedBlock,
        ctx: &mut IngestionContext,
        store: &S,
    ) -> Result<IngestReport, NetsnapError> {
        dispatch!(self, i => i.ingest(block, ctx, store).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ParsingEngine, PARSERS};
    use crate::store::MemoryStore;

    async fn context(store: &MemoryStore, hostname: &str) -> IngestionContext {
        let snapshot = store.create_snapshot(None).await.unwrap();
        let device = store.upsert_device(hostname).await.unwrap();
        IngestionContext::new(snapshot, device)
    }

    fn parse(capture: &str) -> Vec<ParsedBlock> {
        ParsingEngine::new(&PARSERS, 10).parse_str(capture).blocks
    }

    #[test]
    fn every_block_type_has_an_ingestor() {
        for block_type in BlockType::all() {
            assert_eq!(AnyIngestor::for_block(block_type).block_type(), block_type);
        }
    }

    #[tokio::test]
    async fn missing_required_interface_skips_record() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, "R1").await;
        let blocks = parse(
            "\
IP ADDRESS      MAC ADDRESS     EXPIRE(M) TYPE        INTERFACE   VPN-INSTANCE
10.1.1.1        00e0-fc12-3456  20        D-0         GE0/0/1
",
        );
        let report = ArpIngestor.ingest(&blocks[0], &mut ctx, &store).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.upserted, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("GE0/0/1"));
        assert_eq!(store.fact_count(), 0);
    }

    #[tokio::test]
    async fn optional_interface_still_persists() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, "R1").await;
        let blocks = parse(
            "\
Route Flags: R - relay, D - download to fib
Routing Tables: Public
        1.1.1.1/32  Direct  0    0           D   127.0.0.1       InLoopBack0
",
        );
        let report = RouteIngestor.ingest(&blocks[0], &mut ctx, &store).await.unwrap();
        assert_eq!(report.upserted, 1);
        assert!(report.warnings.is_empty());
        let facts = store
            .facts(ctx.device().id, ctx.snapshot().id, Some(FactKind::Route))
            .await
            .unwrap();
        assert_eq!(facts[0].natural_key, "Public|1.1.1.1/32|127.0.0.1");
        assert_eq!(facts[0].interface_id, None);
    }

    #[tokio::test]
    async fn wrong_block_is_rejected() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, "R1").await;
        let blocks = parse("sysname R9\n");
        let res = AlarmIngestor.ingest(&blocks[0], &mut ctx, &store).await;
        assert!(matches!(res, Err(NetsnapError::Ingest(_))));
    }

    #[tokio::test]
    async fn sysname_renames_device() {
        let store = MemoryStore::new();
        let mut ctx = context(&store, "site-a").await;
        let blocks = parse("sysname CORE-01\n");
        SysnameIngestor
            .ingest(&blocks[0], &mut ctx, &store)
            .await
            .unwrap();
        assert_eq!(ctx.device().hostname, "CORE-01");
        assert!(store.device_by_hostname("site-a").await.unwrap().is_none());
    }
}
