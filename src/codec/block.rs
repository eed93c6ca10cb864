use serde::{Deserialize, Serialize};

use super::{
    parsers::{
        alarm::AlarmRecord, arp::ArpRecord, bgp::BgpPeerRecord, device::HardwareRecord,
        interface::InterfaceRecord, lldp::LldpNeighborRecord, optical::TransceiverRecord,
        ospf::OspfPeerRecord, route::RouteRecord, sysname::SysnameRecord,
        version::VersionRecord,
    },
    BlockDiagnostic, BlockType,
};

/// Counters collected while a block was being parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    /// Lines fed to the parser, counting the entry line only when it carries data
    pub lines_processed: usize,
    pub rules_matched: usize,
    pub noise_dropped: usize,
    pub unrecognized: usize,
    pub handler_failures: usize,
    /// Wall time between `start_block` and `get_result`
    pub duration_us: u64,
}

impl BlockStats {
    /// Fraction of meaningful (non-noise) lines that a rule handled successfully.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.rules_matched + self.unrecognized + self.handler_failures;
        if attempted == 0 {
            1.0
        } else {
            self.rules_matched as f64 / attempted as f64
        }
    }
}

/// Typed record list of one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockRecords {
    Version(Vec<VersionRecord>),
    Sysname(Vec<SysnameRecord>),
    InterfaceBrief(Vec<InterfaceRecord>),
    IpInterfaceBrief(Vec<InterfaceRecord>),
    Device(Vec<HardwareRecord>),
    OpticalModule(Vec<TransceiverRecord>),
    Arp(Vec<ArpRecord>),
    LldpNeighbor(Vec<LldpNeighborRecord>),
    OspfPeer(Vec<OspfPeerRecord>),
    BgpPeer(Vec<BgpPeerRecord>),
    RoutingTable(Vec<RouteRecord>),
    Alarm(Vec<AlarmRecord>),
}

impl BlockRecords {
    pub fn len(&self) -> usize {
        match self {
            BlockRecords::Version(r) => r.len(),
            BlockRecords::Sysname(r) => r.len(),
            BlockRecords::InterfaceBrief(r) => r.len(),
            BlockRecords::IpInterfaceBrief(r) => r.len(),
            BlockRecords::Device(r) => r.len(),
            BlockRecords::OpticalModule(r) => r.len(),
            BlockRecords::Arp(r) => r.len(),
            BlockRecords::LldpNeighbor(r) => r.len(),
            BlockRecords::OspfPeer(r) => r.len(),
            BlockRecords::BgpPeer(r) => r.len(),
            BlockRecords::RoutingTable(r) => r.len(),
            BlockRecords::Alarm(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            BlockRecords::Version(_) => BlockType::Version,
            BlockRecords::Sysname(_) => BlockType::Sysname,
            BlockRecords::InterfaceBrief(_) => BlockType::InterfaceBrief,
            BlockRecords::IpInterfaceBrief(_) => BlockType::IpInterfaceBrief,
            BlockRecords::Device(_) => BlockType::Device,
            BlockRecords::OpticalModule(_) => BlockType::OpticalModule,
            BlockRecords::Arp(_) => BlockType::Arp,
            BlockRecords::LldpNeighbor(_) => BlockType::LldpNeighbor,
            BlockRecords::OspfPeer(_) => BlockType::OspfPeer,
            BlockRecords::BgpPeer(_) => BlockType::BgpPeer,
            BlockRecords::RoutingTable(_) => BlockType::RoutingTable,
            BlockRecords::Alarm(_) => BlockType::Alarm,
        }
    }
}

/// Immutable extraction result of one block. Serializes to the DTO shared with reporting and
/// export collaborators: `{type, records, errors, warnings, stats}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedBlock {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub records: BlockRecords,
    pub errors: Vec<BlockDiagnostic>,
    pub warnings: Vec<BlockDiagnostic>,
    pub stats: BlockStats,
}

impl ParsedBlock {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
