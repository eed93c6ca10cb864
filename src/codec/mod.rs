//! Block parsing for device command-output captures.
//!
//! This module turns a raw capture (one text file per device) into a sequence of immutable
//! [`ParsedBlock`]s. A capture has no grammar of its own: it is whatever the operator typed at the
//! device prompt followed by whatever the device printed back. Each recognized command output is
//! handled by one *block parser* variant.
//!
//! ## Key Components
//!
//! - [`BlockParser`] - The contract every variant implements (entry detection, line feeding,
//!   completion, finalization)
//! - [`accumulator::RuleParser`] - Generic driver that implements [`BlockParser`] for any
//!   [`accumulator::Accumulator`] by applying an ordered rule table to each line
//! - [`AnyParser`] - Closed tagged union over all built-in variants
//! - [`ParserRegistry`] - Dispatch table of variants sorted by priority (accessible via
//!   [`PARSERS`])
//! - [`engine::ParsingEngine`] - Drives any number of concurrently active parsers over one line
//!   stream
//!
//! ## Entry Point Tie-Break
//!
//! The registry probes variants in ascending priority; variants with equal priority are probed in
//! registration order. The first variant whose entry point matches wins. The built-in
//! `ip_interface_brief` header (`Interface  IP Address/Mask  Physical  Protocol`) also satisfies
//! the `interface_brief` keyword test (`PHY` is a substring of `Physical`), which is why it is
//! registered at a lower priority number.
//!
//! ## Overlapping Blocks
//!
//! The engine does not assume blocks nest. Every active parser sees every line until it declares
//! itself complete, and every line is also probed for new entry points. Two different commands'
//! outputs interleaved in a capture therefore produce two independent blocks.

use enumset::{EnumSet, EnumSetType};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::NetsnapError;

pub mod accumulator;
pub mod block;
pub mod diagnostic;
pub mod engine;
pub mod parsers;

pub use accumulator::{Accumulator, RuleParser, RuleSet};
pub use block::{BlockRecords, BlockStats, ParsedBlock};
pub use diagnostic::BlockDiagnostic;
pub use engine::{ParseRun, ParsingEngine};

use parsers::{
    alarm::AlarmTable, arp::ArpTable, bgp::BgpPeerTable, device::DeviceTable,
    interface::{InterfaceBriefTable, IpInterfaceBriefTable},
    lldp::LldpNeighborTable, optical::OpticalModuleTable, ospf::OspfPeerTable,
    route::RoutingTable, sysname::Sysname, version::VersionInfo,
};

/// Global dispatch table with every built-in parser variant.
pub static PARSERS: Lazy<ParserRegistry> = Lazy::new(ParserRegistry::builtin);

/// Priority given to variants that do not ask for a specific rank.
pub const DEFAULT_PRIORITY: u16 = 100;

static PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:<([^<>\s]+)>|\[[~*]?[^\[\]\s]+\])").expect("prompt regex is valid")
});

/// True when a line starts with a device prompt (`<R1>` in user view, `[R1]` / `[~R1]` in
/// system view).
pub fn is_prompt(line: &str) -> bool {
    PROMPT.is_match(line)
}

/// Hostname carried by a user-view prompt (`<R1>display arp` => `R1`).
pub fn prompt_hostname(line: &str) -> Option<String> {
    PROMPT
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// True when every keyword occurs in the line. Column widths reflow between software releases,
/// so headers are recognized by their words, not their alignment.
pub fn contains_all(line: &str, keywords: &[&str]) -> bool {
    keywords.iter().all(|k| line.contains(k))
}

#[derive(Debug, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumSetType)]
#[serde(rename_all = "snake_case")]
#[enumset(serialize_repr = "list")]
pub enum BlockType {
    Sysname,
    Version,
    InterfaceBrief,
    IpInterfaceBrief,
    Device,
    OpticalModule,
    Arp,
    LldpNeighbor,
    OspfPeer,
    BgpPeer,
    RoutingTable,
    Alarm,
}

impl BlockType {
    pub fn all() -> EnumSet<BlockType> {
        EnumSet::all()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Sysname => "sysname",
            BlockType::Version => "version",
            BlockType::InterfaceBrief => "interface_brief",
            BlockType::IpInterfaceBrief => "ip_interface_brief",
            BlockType::Device => "device",
            BlockType::OpticalModule => "optical_module",
            BlockType::Arp => "arp",
            BlockType::LldpNeighbor => "lldp_neighbor",
            BlockType::OspfPeer => "ospf_peer",
            BlockType::BgpPeer => "bgp_peer",
            BlockType::RoutingTable => "routing_table",
            BlockType::Alarm => "alarm",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = NetsnapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::all()
            .iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NetsnapError::NotFound(format!("unknown block type '{s}'")))
    }
}

/// Groups captured by a variant's entry-point test, handed to `start_block`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMatch {
    groups: Vec<Option<String>>,
}

impl EntryMatch {
    pub fn empty() -> Self {
        EntryMatch::default()
    }

    pub fn from_captures(caps: &Captures<'_>) -> Self {
        EntryMatch {
            groups: caps
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }

    /// Capture group `idx` (0 is the whole match).
    pub fn group(&self, idx: usize) -> Option<&str> {
        self.groups.get(idx).and_then(|g| g.as_deref())
    }
}

/// What happened to one line fed to an active parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// A rule matched and its handler succeeded.
    Matched,
    /// The line is known noise and was dropped.
    Noise,
    /// Nothing matched; a warning was recorded.
    Unrecognized,
    /// A rule matched but its handler failed; an error was recorded.
    Failed,
}

pub trait BlockParser {
    fn block_type(&self) -> BlockType;

    /// Initialize the accumulator from the entry-point line.
    fn start_block(&mut self, line: &str, entry: &EntryMatch);

    /// Feed one line of the block. Never fails: problems become block errors or warnings.
    fn parse_line(&mut self, line: &str) -> LineOutcome;

    /// Called before `parse_line` for each line; `true` means `line` is not part of this block.
    fn is_block_complete(&self, line: &str) -> bool;

    fn get_result(self) -> ParsedBlock;
}

/// Closed set of built-in parser variants.
pub enum AnyParser {
    Version(RuleParser<VersionInfo>),
    Sysname(RuleParser<Sysname>),
    InterfaceBrief(RuleParser<InterfaceBriefTable>),
    IpInterfaceBrief(RuleParser<IpInterfaceBriefTable>),
    Device(RuleParser<DeviceTable>),
    OpticalModule(RuleParser<OpticalModuleTable>),
    Arp(RuleParser<ArpTable>),
    LldpNeighbor(RuleParser<LldpNeighborTable>),
    OspfPeer(RuleParser<OspfPeerTable>),
    BgpPeer(RuleParser<BgpPeerTable>),
    RoutingTable(RuleParser<RoutingTable>),
    Alarm(RuleParser<AlarmTable>),
}

macro_rules! dispatch {
    ($value:expr, $parser:ident => $body:expr) => {
        match $value {
            AnyParser::Version($parser) => $body,
            AnyParser::Sysname($parser) => $body,
            AnyParser::InterfaceBrief($parser) => $body,
            AnyParser::IpInterfaceBrief($parser) => $body,
            AnyParser::Device($parser) => $body,
            AnyParser::OpticalModule($parser) => $body,
            AnyParser::Arp($parser) => $body,
            AnyParser::LldpNeighbor($parser) => $body,
            AnyParser::OspfPeer($parser) => $body,
            AnyParser::BgpPeer($parser) => $body,
            AnyParser::RoutingTable($parser) => $body,
            AnyParser::Alarm($parser) => $body,
        }
    };
}

impl AnyParser {
    /// Fresh, unstarted parser for `block_type`.
    pub fn new(block_type: BlockType) -> AnyParser {
        match block_type {
            BlockType::Version => AnyParser::Version(RuleParser::default()),
            BlockType::Sysname => AnyParser::Sysname(RuleParser::default()),
            BlockType::InterfaceBrief => AnyParser::InterfaceBrief(RuleParser::default()),
            BlockType::IpInterfaceBrief => AnyParser::IpInterfaceBrief(RuleParser::default()),
            BlockType::Device => AnyParser::Device(RuleParser::default()),
            BlockType::OpticalModule => AnyParser::OpticalModule(RuleParser::default()),
            BlockType::Arp => AnyParser::Arp(RuleParser::default()),
            BlockType::LldpNeighbor => AnyParser::LldpNeighbor(RuleParser::default()),
            BlockType::OspfPeer => AnyParser::OspfPeer(RuleParser::default()),
            BlockType::BgpPeer => AnyParser::BgpPeer(RuleParser::default()),
            BlockType::RoutingTable => AnyParser::RoutingTable(RuleParser::default()),
            BlockType::Alarm => AnyParser::Alarm(RuleParser::default()),
        }
    }
}

impl BlockParser for AnyParser {
    fn block_type(&self) -> BlockType {
        dispatch!(self, p => p.block_type())
    }

    fn start_block(&mut self, line: &str, entry: &EntryMatch) {
        dispatch!(self, p => p.start_block(line, entry))
    }

    fn parse_line(&mut self, line: &str) -> LineOutcome {
        dispatch!(self, p => p.parse_line(line))
    }

    fn is_block_complete(&self, line: &str) -> bool {
        dispatch!(self, p => p.is_block_complete(line))
    }

    fn get_result(self) -> ParsedBlock {
        dispatch!(self, p => p.get_result())
    }
}

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct ParserSpec {
    pub block_type: BlockType,
    pub priority: u16,
    pub is_entry_point: fn(&str) -> Option<EntryMatch>,
}

impl ParserSpec {
    pub fn of<A: Accumulator>(priority: u16) -> Self {
        ParserSpec {
            block_type: A::BLOCK_TYPE,
            priority,
            is_entry_point: A::is_entry_point,
        }
    }
}

impl fmt::Debug for ParserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSpec")
            .field("block_type", &self.block_type)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Parser variants sorted by (priority, registration order).
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry(Vec<ParserSpec>);

impl ParserRegistry {
    pub fn builtin() -> Self {
        let mut registry = ParserRegistry::default();
        registry.register(ParserSpec::of::<Sysname>(10));
        registry.register(ParserSpec::of::<VersionInfo>(10));
        registry.register(ParserSpec::of::<IpInterfaceBriefTable>(20));
        registry.register(ParserSpec::of::<InterfaceBriefTable>(30));
        registry.register(ParserSpec::of::<DeviceTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<OpticalModuleTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<ArpTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<LldpNeighborTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<OspfPeerTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<BgpPeerTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<RoutingTable>(DEFAULT_PRIORITY));
        registry.register(ParserSpec::of::<AlarmTable>(DEFAULT_PRIORITY));
        registry
    }

    /// Built-in registry restricted to `enabled`.
    pub fn with_enabled(enabled: EnumSet<BlockType>) -> Self {
        let mut registry = ParserRegistry::builtin();
        registry.0.retain(|spec| enabled.contains(spec.block_type));
        registry
    }

    /// Add or replace a variant. Replacing keeps the variant's original registration slot.
    pub fn register(&mut self, spec: ParserSpec) {
        if let Some(existing) = self.0.iter_mut().find(|s| s.block_type == spec.block_type) {
            tracing::info!(
                "[ParserRegistry::register] Overwriting existing parser: {}",
                spec.block_type
            );
            *existing = spec;
        } else {
            self.0.push(spec);
        }
        // Stable sort keeps registration order among equal priorities.
        self.0.sort_by_key(|s| s.priority);
    }

    /// First variant, in (priority, registration) order, whose entry point matches `line`.
    pub fn detect(&self, line: &str) -> Option<(BlockType, EntryMatch)> {
        self.0
            .iter()
            .find_map(|spec| (spec.is_entry_point)(line).map(|m| (spec.block_type, m)))
    }

    /// Create and start a parser for a detected block.
    pub fn instantiate(&self, block_type: BlockType, line: &str, entry: &EntryMatch) -> AnyParser {
        let mut parser = AnyParser::new(block_type);
        parser.start_block(line, entry);
        parser
    }

    pub fn block_types(&self) -> Vec<BlockType> {
        self.0.iter().map(|s| s.block_type).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_orders_by_priority_then_registration() {
        let types = PARSERS.block_types();
        assert_eq!(types[0], BlockType::Sysname);
        assert_eq!(types[1], BlockType::Version);
        assert_eq!(types[2], BlockType::IpInterfaceBrief);
        assert_eq!(types[3], BlockType::InterfaceBrief);
        assert_eq!(types.len(), 12);
    }

    #[test]
    fn ip_interface_header_wins_collision() {
        // Carries both column sets; ip-brief is registered at the lower priority value.
        let header = "Interface             IP Address/Mask      Physical   PHY   Protocol";
        assert!(InterfaceBriefTable::is_entry_point(header).is_some());
        assert!(IpInterfaceBriefTable::is_entry_point(header).is_some());
        let (block_type, _) = PARSERS.detect(header).unwrap();
        assert_eq!(block_type, BlockType::IpInterfaceBrief);

        let ip_brief = "Interface                         IP Address/Mask      Physical   Protocol";
        assert!(InterfaceBriefTable::is_entry_point(ip_brief).is_none());
        assert_eq!(PARSERS.detect(ip_brief).unwrap().0, BlockType::IpInterfaceBrief);
        let brief = "Interface                   PHY   Protocol  InUti OutUti   inErrors  outErrors";
        assert_eq!(PARSERS.detect(brief).unwrap().0, BlockType::InterfaceBrief);
    }

    #[test]
    fn enabled_set_filters_registry() {
        let registry = ParserRegistry::with_enabled(BlockType::Arp | BlockType::Alarm);
        assert_eq!(registry.block_types(), vec![BlockType::Arp, BlockType::Alarm]);
        assert!(registry
            .detect("Interface   PHY   Protocol  InUti OutUti   inErrors  outErrors")
            .is_none());
    }

    #[test]
    fn prompt_detection() {
        assert!(is_prompt("<R1>display arp"));
        assert!(is_prompt("[~CORE-01]display version"));
        assert!(!is_prompt("10.0.0.0/8   Static 60 0 RD 10.0.0.1 GE0/0/1"));
        assert_eq!(prompt_hostname("<CORE-01>display version").as_deref(), Some("CORE-01"));
        assert_eq!(prompt_hostname("[CORE-01]"), None);
    }

    #[test]
    fn block_type_names_round_trip() {
        for t in BlockType::all() {
            assert_eq!(t.as_str().parse::<BlockType>().unwrap(), t);
        }
        assert!("bogus".parse::<BlockType>().is_err());
    }
}
